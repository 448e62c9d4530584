//! Derivative-free minimisation (Nelder-Mead simplex)

use crate::{MathError, Result};

/// Settings for the simplex search
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Stop when the spread of simplex values falls below this
    pub tolerance: f64,
    /// Relative size of the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

/// Best point found by a minimiser
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Argument of the minimum
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap
    pub converged: bool,
}

impl NelderMead {
    /// Minimise `objective` starting from `start`.
    ///
    /// Non-finite objective values are treated as `+inf`, which lets callers
    /// express constraints by returning `f64::INFINITY` outside the feasible set.
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64,
    {
        let dim = start.len();
        if dim == 0 {
            return Err(MathError::InvalidInput(
                "Cannot minimise over zero parameters".to_string(),
            ));
        }
        let eval = |p: &[f64]| {
            let v = objective(p);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
        simplex.push(start.to_vec());
        for i in 0..dim {
            let mut p = start.to_vec();
            p[i] += if p[i] != 0.0 {
                self.initial_step * p[i].abs()
            } else {
                self.initial_step
            };
            simplex.push(p);
        }
        let mut values: Vec<f64> = simplex.iter().map(|p| eval(p)).collect();

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            iterations += 1;

            let mut order: Vec<usize> = (0..=dim).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if values[dim].is_finite() && (values[dim] - values[0]).abs() <= self.tolerance {
                converged = true;
                break;
            }

            let centroid: Vec<f64> = (0..dim)
                .map(|j| simplex[..dim].iter().map(|p| p[j]).sum::<f64>() / dim as f64)
                .collect();
            let towards = |coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[dim])
                    .map(|(c, w)| c + coef * (w - c))
                    .collect()
            };

            let reflected = towards(-1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = towards(-2.0);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[dim] = expanded;
                    values[dim] = f_expanded;
                } else {
                    simplex[dim] = reflected;
                    values[dim] = f_reflected;
                }
            } else if f_reflected < values[dim - 1] {
                simplex[dim] = reflected;
                values[dim] = f_reflected;
            } else {
                let contracted = if f_reflected < values[dim] {
                    towards(-0.5)
                } else {
                    towards(0.5)
                };
                let f_contracted = eval(&contracted);
                if f_contracted < values[dim].min(f_reflected) {
                    simplex[dim] = contracted;
                    values[dim] = f_contracted;
                } else {
                    // Shrink towards the best vertex
                    for i in 1..=dim {
                        let shrunk: Vec<f64> = simplex[0]
                            .iter()
                            .zip(&simplex[i])
                            .map(|(b, p)| b + 0.5 * (p - b))
                            .collect();
                        values[i] = eval(&shrunk);
                        simplex[i] = shrunk;
                    }
                }
            }
        }

        let best = (0..=dim)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        if !values[best].is_finite() {
            return Err(MathError::CalculationError(
                "Objective is not finite anywhere on the simplex".to_string(),
            ));
        }

        Ok(Minimum {
            point: simplex[best].clone(),
            value: values[best],
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_bowl() {
        let result = NelderMead::default()
            .minimize(|p| (p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2), &[0.0, 0.0])
            .unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.point[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_infeasible_region_is_avoided() {
        let objective = |p: &[f64]| {
            if p[0] < 1.0 {
                f64::INFINITY
            } else {
                p[0] * p[0]
            }
        };
        let result = NelderMead::default().minimize(objective, &[5.0]).unwrap();
        assert!(result.point[0] >= 1.0);
        assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_all_infinite_is_error() {
        let result = NelderMead::default().minimize(|_| f64::NAN, &[1.0]);
        assert!(result.is_err());
    }
}
