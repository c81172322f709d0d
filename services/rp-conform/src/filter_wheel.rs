//! Filter wheel conformance tests

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::classify::{MemberType, Required};
use crate::common;
use crate::config::{Config, FilterWheelSettings, LegacyErrorCodes};
use crate::context::TestContext;
use crate::device::FilterWheelDevice;
use crate::performance;
use crate::report::Report;
use crate::tester::ConformanceTester;

/// Highest FilterWheel interface version
const MAX_INTERFACE_VERSION: i32 = 3;

/// Position reported while the wheel is moving
const MOVING: i32 = -1;

pub struct FilterWheelTester {
    device: Arc<dyn FilterWheelDevice>,
    ctx: TestContext,
    settings: FilterWheelSettings,
    legacy: Vec<LegacyErrorCodes>,
    filter_count: usize,
    connected: bool,
}

impl FilterWheelTester {
    pub fn new(
        device: Arc<dyn FilterWheelDevice>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            ctx: TestContext::new("FilterWheel", &config.general, cancel),
            settings: config.filter_wheel.clone(),
            legacy: config.legacy_error_codes.clone(),
            filter_count: 0,
            connected: false,
        }
    }

    async fn check_focus_offsets(&mut self) -> Option<Vec<i32>> {
        self.ctx.call_to_driver("FocusOffsets", "FocusOffsets");
        match self.device.focus_offsets().await {
            Ok(offsets) if offsets.is_empty() => {
                self.ctx.issue(
                    "FocusOffsets",
                    "Found no offset values in the returned array",
                );
                Some(offsets)
            }
            Ok(offsets) => {
                self.ctx.ok(
                    "FocusOffsets",
                    format!("Got {} filter offsets", offsets.len()),
                );
                for (i, offset) in offsets.iter().enumerate() {
                    self.ctx
                        .info("FocusOffsets", format!("Filter {} Offset: {}", i, offset));
                }
                Some(offsets)
            }
            Err(err) => {
                self.ctx.handle_exception(
                    "FocusOffsets",
                    MemberType::Property,
                    Required::Mandatory,
                    &err,
                    "FocusOffsets",
                );
                None
            }
        }
    }

    async fn check_names(&mut self) -> Option<Vec<String>> {
        self.ctx.call_to_driver("Names", "Names");
        match self.device.names().await {
            Ok(names) if names.is_empty() => {
                self.ctx
                    .issue("Names", "Found no filter names in the returned array");
                Some(names)
            }
            Ok(names) => {
                self.ctx
                    .ok("Names", format!("Got {} filter names", names.len()));
                for (i, name) in names.iter().enumerate() {
                    if name.trim().is_empty() {
                        self.ctx
                            .issue("Names", format!("Filter {} has an empty name", i));
                    } else {
                        self.ctx
                            .info("Names", format!("Filter {} Name: {}", i, name));
                    }
                }
                Some(names)
            }
            Err(err) => {
                self.ctx.handle_exception(
                    "Names",
                    MemberType::Property,
                    Required::Mandatory,
                    &err,
                    "Names",
                );
                None
            }
        }
    }

    async fn check_position_read(&mut self) {
        self.ctx.call_to_driver("Position", "Position");
        match self.device.position().await {
            Ok(MOVING) => {
                self.ctx
                    .info("Position", "Filter wheel is moving, waiting for it to stop");
                if self.wait_until_stopped("Position").await.is_some() {
                    self.ctx.ok("Position", "Filter wheel stopped");
                }
            }
            Ok(position) if position >= 0 && (position as usize) < self.filter_count => {
                self.ctx
                    .ok("Position", format!("Currently at position: {}", position));
            }
            Ok(position) => {
                self.ctx.issue(
                    "Position",
                    format!(
                        "Illegal filter position returned: {} (wheel has {} filters)",
                        position, self.filter_count
                    ),
                );
            }
            Err(err) => self.ctx.handle_exception(
                "Position",
                MemberType::Property,
                Required::Mandatory,
                &err,
                "Position",
            ),
        }
    }

    /// Wait while the wheel reports -1; returns the elapsed seconds
    async fn wait_until_stopped(&mut self, test: &str) -> Option<f64> {
        let device = Arc::clone(&self.device);
        let result = self
            .ctx
            .wait_while(
                "Filter wheel move",
                || {
                    let device = Arc::clone(&device);
                    async move { Ok(device.position().await? == MOVING) }
                },
                self.settings.move_timeout,
            )
            .await;

        match result {
            Ok(elapsed) => Some(elapsed.as_secs_f64()),
            Err(err) => {
                self.ctx
                    .report_wait_error(test, &err, "Filter wheel did not stop moving");
                None
            }
        }
    }

    async fn move_to(&mut self, position: i32) {
        let test = "Position Set";
        self.ctx
            .call_to_driver(test, &format!("Position = {}", position));
        if let Err(err) = self.device.set_position(position).await {
            self.ctx.handle_exception(
                test,
                MemberType::Property,
                Required::Mandatory,
                &err,
                &format!("Setting position {}", position),
            );
            return;
        }

        let Some(elapsed) = self.wait_until_stopped(test).await else {
            return;
        };

        match self.device.position().await {
            Ok(reached) if reached == position => self.ctx.ok(
                test,
                format!("Reached position: {} in: {:.1} seconds", position, elapsed),
            ),
            Ok(reached) => self.ctx.issue(
                test,
                format!(
                    "Failed to reach position: {}, reached: {} in: {:.1} seconds",
                    position, reached, elapsed
                ),
            ),
            Err(err) => self.ctx.handle_exception(
                test,
                MemberType::Property,
                Required::Mandatory,
                &err,
                "Reading Position after a move",
            ),
        }
    }

    async fn check_bad_position(&mut self, position: i32) {
        let test = "Position Set";
        self.ctx
            .call_to_driver(test, &format!("Position = {}", position));
        match self.device.set_position(position).await {
            Ok(()) => {
                self.ctx
                    .issue(test, format!("Failed to reject bad position: {}", position));
                self.wait_until_stopped(test).await;
            }
            Err(err) => self.ctx.handle_invalid_value_exception_as_ok(
                test,
                MemberType::Property,
                Required::MustBeImplemented,
                &err,
                &format!("Setting bad position {}", position),
                &format!("Correctly rejected bad position: {}", position),
            ),
        }
    }
}

#[async_trait]
impl ConformanceTester for FilterWheelTester {
    fn context(&self) -> &TestContext {
        &self.ctx
    }

    async fn check_common(&mut self) -> bool {
        self.connected = common::connect(&mut self.ctx, self.device.as_ref()).await;
        if !self.connected {
            return false;
        }
        let identity = common::check_common(
            &mut self.ctx,
            self.device.as_ref(),
            MAX_INTERFACE_VERSION,
            &self.legacy,
        )
        .await;
        if !identity.name.is_empty() {
            self.ctx.report.device = identity.name;
        }
        !self.ctx.cancelled()
    }

    async fn pre_run_check(&mut self) {
        if let Ok(MOVING) = self.device.position().await {
            self.ctx.info(
                "Pre-run Check",
                "Filter wheel is moving, waiting for it to stop",
            );
            self.wait_until_stopped("Pre-run Check").await;
        }
    }

    async fn check_properties(&mut self) {
        let offsets = self.check_focus_offsets().await;
        let names = self.check_names().await;

        match (&offsets, &names) {
            (Some(offsets), Some(names)) if offsets.len() != names.len() => {
                self.ctx.issue(
                    "Names",
                    format!(
                        "Number of filter offsets ({}) and number of names ({}) are different",
                        offsets.len(),
                        names.len()
                    ),
                );
            }
            _ => {}
        }
        self.filter_count = names
            .as_ref()
            .map(Vec::len)
            .or_else(|| offsets.as_ref().map(Vec::len))
            .unwrap_or(0);

        self.check_position_read().await;
        if self.ctx.cancelled() {
            return;
        }

        if self.filter_count == 0 {
            self.ctx.info(
                "Position Set",
                "Skipping position tests because the filter count is unknown",
            );
            return;
        }

        let count = self.filter_count as i32;
        for position in 0..count {
            self.move_to(position).await;
            if self.ctx.cancelled() {
                return;
            }
        }
        for position in (0..count).rev() {
            self.move_to(position).await;
            if self.ctx.cancelled() {
                return;
            }
        }

        self.check_bad_position(-1).await;
        self.check_bad_position(count).await;
    }

    async fn check_methods(&mut self) {
        // The filter wheel interface has no methods beyond the common set
    }

    async fn check_performance(&mut self) {
        let device = Arc::clone(&self.device);
        performance::measure(&mut self.ctx, "FocusOffsets", || device.focus_offsets()).await;
        if self.ctx.cancelled() {
            return;
        }
        performance::measure(&mut self.ctx, "Names", || device.names()).await;
        if self.ctx.cancelled() {
            return;
        }
        performance::measure(&mut self.ctx, "Position", || device.position()).await;
    }

    async fn post_run_check(&mut self) {
        self.ctx.debug("Post-run Check", "Nothing to restore");
    }

    async fn teardown(&mut self) {
        if self.connected {
            common::disconnect(&mut self.ctx, self.device.as_ref()).await;
        }
    }

    fn into_report(self: Box<Self>) -> Report {
        self.ctx.into_report()
    }
}
