//! Tester phases and the runner that drives them

use async_trait::async_trait;

use crate::context::TestContext;
use crate::report::Report;

/// The phases every device tester goes through, in run order
#[async_trait]
pub trait ConformanceTester: Send {
    fn context(&self) -> &TestContext;

    /// Connect and check the common Device members. False stops the run.
    async fn check_common(&mut self) -> bool;

    /// Bring the device into a known state before testing
    async fn pre_run_check(&mut self);

    async fn check_properties(&mut self);

    async fn check_methods(&mut self);

    async fn check_performance(&mut self);

    /// Restore the device after testing
    async fn post_run_check(&mut self);

    /// Disconnect and release the device
    async fn teardown(&mut self);

    fn into_report(self: Box<Self>) -> Report;
}

/// Run all phases, stopping early when the run is cancelled
pub async fn run_tester(mut tester: Box<dyn ConformanceTester>, performance: bool) -> Report {
    if tester.check_common().await {
        tracing::info!("Common members checked, starting device tests");
        run_phases(tester.as_mut(), performance).await;
    }
    tester.teardown().await;

    let cancelled = tester.context().cancelled();
    let mut report = tester.into_report();
    report.cancelled = cancelled;
    tracing::info!("{}", report.summary());
    report
}

async fn run_phases(tester: &mut dyn ConformanceTester, performance: bool) {
    tester.pre_run_check().await;
    if tester.context().cancelled() {
        return;
    }

    tester.check_properties().await;
    if tester.context().cancelled() {
        return;
    }

    tester.check_methods().await;
    if tester.context().cancelled() {
        return;
    }

    if performance {
        tester.check_performance().await;
        if tester.context().cancelled() {
            return;
        }
    }

    tester.post_run_check().await;
}
