//! Transaction rate measurement

use std::future::Future;
use std::time::{Duration, Instant};

use crate::context::TestContext;
use crate::error::DeviceResult;

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Informational band for a measured transaction rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    /// More than 10 per second
    Fast,
    /// 2 to 10 per second
    Good,
    /// 1 to 2 per second
    Slow,
    /// Less than 1 per second
    VerySlow,
}

impl PerformanceBand {
    pub fn from_rate(rate: f64) -> Self {
        if rate > 10.0 {
            PerformanceBand::Fast
        } else if rate >= 2.0 {
            PerformanceBand::Good
        } else if rate >= 1.0 {
            PerformanceBand::Slow
        } else {
            PerformanceBand::VerySlow
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PerformanceBand::Fast => "more than 10 per second",
            PerformanceBand::Good => "between 2 and 10 per second",
            PerformanceBand::Slow => "between 1 and 2 per second",
            PerformanceBand::VerySlow => "less than 1 per second",
        }
    }
}

/// Call `member` repeatedly for the context's loop time and report the rate.
///
/// Returns the measured transactions per second, or `None` when the member
/// failed or the run was cancelled.
pub async fn measure<F, Fut, T>(
    ctx: &mut TestContext,
    test: &str,
    mut member: F,
) -> Option<f64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeviceResult<T>>,
{
    let loop_time = ctx.perf_loop_time;
    let start = Instant::now();
    let mut last_cancel_check = start;
    let mut count: u64 = 0;

    ctx.call_to_driver(test, "performance loop");
    while start.elapsed() < loop_time {
        if let Err(err) = member().await {
            ctx.info(test, format!("Unable to measure performance: {}", err));
            return None;
        }
        count += 1;

        if last_cancel_check.elapsed() >= CANCEL_CHECK_INTERVAL {
            if ctx.cancelled() {
                return None;
            }
            last_cancel_check = Instant::now();
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    if count == 0 || elapsed <= 0.0 {
        ctx.info(
            test,
            "No transactions completed within the performance loop time",
        );
        return None;
    }

    let rate = count as f64 / elapsed;
    let band = PerformanceBand::from_rate(rate);
    ctx.info(
        test,
        format!(
            "Transaction rate: {:.1} per second ({})",
            rate,
            band.describe()
        ),
    );
    Some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneralConfig;
    use crate::error::DeviceError;
    use crate::report::Outcome;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn bands() {
        assert_eq!(PerformanceBand::from_rate(25.0), PerformanceBand::Fast);
        assert_eq!(PerformanceBand::from_rate(10.0), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_rate(2.0), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_rate(1.5), PerformanceBand::Slow);
        assert_eq!(PerformanceBand::from_rate(0.2), PerformanceBand::VerySlow);
    }

    #[tokio::test]
    async fn measure_reports_rate_as_info() {
        let general = GeneralConfig {
            perf_loop_time: Duration::from_millis(50),
            ..Default::default()
        };
        let mut ctx = TestContext::new("Test", &general, CancellationToken::new());

        let rate = measure(&mut ctx, "Position", || async { Ok::<_, DeviceError>(1) }).await;

        assert!(rate.unwrap() > 10.0);
        assert_eq!(ctx.report.count(Outcome::Info), 1);
        assert_eq!(ctx.report.count(Outcome::Issue), 0);
    }

    #[tokio::test]
    async fn measure_stops_on_error() {
        let general = GeneralConfig {
            perf_loop_time: Duration::from_millis(50),
            ..Default::default()
        };
        let mut ctx = TestContext::new("Test", &general, CancellationToken::new());

        let rate = measure(&mut ctx, "Position", || async {
            Err::<i32, _>(DeviceError::ascom(0x400, "nope"))
        })
        .await;

        assert!(rate.is_none());
        assert!(ctx.report.entries[0].message.contains("Unable to measure"));
    }

    #[tokio::test]
    async fn measure_with_zero_loop_time_reports_no_rate() {
        let general = GeneralConfig {
            perf_loop_time: Duration::ZERO,
            ..Default::default()
        };
        let mut ctx = TestContext::new("Test", &general, CancellationToken::new());

        let rate = measure(&mut ctx, "Position", || async { Ok::<_, DeviceError>(1) }).await;

        assert!(rate.is_none());
        assert_eq!(ctx.report.count(Outcome::Info), 1);
        assert!(!ctx.report.entries[0].message.contains("NaN"));
        assert!(ctx.report.entries[0]
            .message
            .starts_with("No transactions completed"));
    }
}
