use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use forecast_engine::metrics::evaluate_forecast;
use forecast_engine::models::BacktestSeries;

#[test]
fn test_regression_metrics() {
    let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    let metrics = evaluate_forecast(&predicted, &actual).unwrap();
    assert_abs_diff_eq!(metrics.mae, 2.4, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.mse, 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.rmse, 6.0_f64.sqrt(), epsilon = 1e-12);
    assert!(metrics.mape > 0.0 && metrics.mape < 15.0);
    // Both series rise at every step.
    assert_abs_diff_eq!(metrics.direction_accuracy, 100.0, epsilon = 1e-12);
}

#[test]
fn test_direction_accuracy_counts_misses() {
    let actual = vec![1.0, 2.0, 3.0];
    let predicted = vec![1.0, 0.5, 1.0];
    let metrics = evaluate_forecast(&predicted, &actual).unwrap();
    assert_abs_diff_eq!(metrics.direction_accuracy, 50.0, epsilon = 1e-12);
}

#[test]
fn test_mismatched_lengths_rejected() {
    assert!(evaluate_forecast(&[1.0, 2.0], &[1.0]).is_err());
    assert!(evaluate_forecast(&[], &[]).is_err());
}

#[test]
fn test_backtest_metrics() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let dates = vec![start, start.succ_opt().unwrap()];
    let backtest = BacktestSeries::new(dates.clone(), vec![10.0, 11.0], vec![10.0, 12.0]).unwrap();
    let metrics = backtest.metrics().unwrap();
    assert_abs_diff_eq!(metrics.mae, 0.5, epsilon = 1e-12);

    assert!(BacktestSeries::new(dates, vec![1.0], vec![1.0, 2.0]).is_err());
}
