/*!
 * Tests for the application controller's bounded I/O helper
 */

use std::time::Duration;
use bdsubmerge::app_controller::run_bounded;

/// Test a quick task returns its value untouched
#[tokio::test]
async fn test_run_bounded_withQuickTask_shouldReturnItsValue() {
    let value = run_bounded("Quick read".to_string(), Duration::from_secs(5), || 42)
        .await
        .unwrap();
    assert_eq!(value, 42);
}

/// Test a stalled task surfaces a timeout error instead of hanging
#[tokio::test]
async fn test_run_bounded_withStalledTask_shouldReportTimeout() {
    let result = run_bounded(
        "Disc scan of stalled mount".to_string(),
        Duration::from_millis(50),
        || {
            // Stands in for a read against a dead disc image
            std::thread::sleep(Duration::from_secs(2));
            42
        },
    )
    .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("timed out"));
    assert!(err.contains("Disc scan of stalled mount"));
}

/// Test errors from the task itself pass through the bound untouched
#[tokio::test]
async fn test_run_bounded_withFailingTask_shouldReturnTaskError() {
    let result: Result<u32, String> =
        run_bounded("Failing read".to_string(), Duration::from_secs(5), || {
            Err("no such file".to_string())
        })
        .await
        .unwrap();
    assert_eq!(result.unwrap_err(), "no such file");
}
