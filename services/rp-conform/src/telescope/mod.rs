//! Telescope conformance tests
//!
//! The tester reads the capability flags once while checking the common
//! members and every later check consults that snapshot. Properties are
//! checked first, then the methods in an order that keeps the mount usable:
//! non-moving methods, motion, slews and syncs, pier side, the optional
//! extended suites and finally park.

/// Await each check in turn, returning early once the run is cancelled
macro_rules! run_checks {
    ($tester:ident; $($check:expr),+ $(,)?) => {
        $(
            if $tester.ctx.cancelled() {
                return;
            }
            $check.await;
        )+
    };
}

mod capabilities;
mod extended;
mod methods;
mod performance;
mod pier_side;
mod properties;
mod slew_sync;

pub use capabilities::TelescopeCapabilities;
pub use extended::{compare_displacement, Displacement};
pub use performance::PerformanceType;
pub use pier_side::{classify_pier_side, PierSideModel, SideOfPierResults};
pub use slew_sync::{Frame, SlewSyncType};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::astronomy::{format_dms, format_hms, local_sidereal_time};
use crate::classify::{MemberType, Required};
use crate::common;
use crate::config::{Config, LegacyErrorCodes, TelescopeSettings};
use crate::context::TestContext;
use crate::device::{AlignmentMode, TelescopeDevice};
use crate::error::DeviceResult;
use crate::report::Report;
use crate::tester::ConformanceTester;

/// Highest Telescope interface version
const MAX_INTERFACE_VERSION: i32 = 4;

/// Site values captured before testing so they can be put back afterwards
#[derive(Debug, Clone, Copy, Default)]
struct SiteSnapshot {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
}

pub struct TelescopeTester {
    device: Arc<dyn TelescopeDevice>,
    ctx: TestContext,
    settings: TelescopeSettings,
    legacy: Vec<LegacyErrorCodes>,
    caps: TelescopeCapabilities,
    interface_version: i32,
    alignment: Option<AlignmentMode>,
    site: SiteSnapshot,
    connected: bool,
    /// The mount is parked and cannot be unparked, so nothing may move it
    stuck_parked: bool,
}

impl TelescopeTester {
    pub fn new(
        device: Arc<dyn TelescopeDevice>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            ctx: TestContext::new("Telescope", &config.general, cancel),
            settings: config.telescope.clone(),
            legacy: config.legacy_error_codes.clone(),
            caps: TelescopeCapabilities::default(),
            interface_version: 1,
            alignment: None,
            site: SiteSnapshot::default(),
            connected: false,
            stuck_parked: false,
        }
    }

    pub fn capabilities(&self) -> &TelescopeCapabilities {
        &self.caps
    }

    /// Mandatory from the given interface version onwards, optional before it
    fn required_from(&self, version: i32) -> Required {
        if self.interface_version >= version {
            Required::Mandatory
        } else {
            Required::Optional
        }
    }

    /// False, with an Info entry, when configuration or a stuck park rules out `test`
    fn should_run(&mut self, test: &str, moves_mount: bool) -> bool {
        if !self.settings.is_enabled(test) {
            self.ctx.info(test, "Skipped by configuration");
            return false;
        }
        if moves_mount && self.stuck_parked {
            self.ctx.info(
                test,
                "Skipped because the mount is parked and cannot be unparked",
            );
            return false;
        }
        true
    }

    fn site_latitude(&self) -> f64 {
        self.site.latitude.unwrap_or(0.0)
    }

    /// The mount's sidereal time, falling back to one computed from the site longitude
    async fn sidereal_hours(&self) -> f64 {
        match self.device.sidereal_time().await {
            Ok(lst) => lst,
            Err(err) => {
                tracing::debug!("SiderealTime unavailable ({}), computing it locally", err);
                local_sidereal_time(Utc::now(), self.site.longitude.unwrap_or(0.0))
            }
        }
    }

    /// Put tracking into the requested state. False when that is not possible.
    async fn ensure_tracking(&mut self, test: &str, enabled: bool) -> bool {
        if let Ok(current) = self.device.tracking().await {
            if current == enabled {
                return true;
            }
        }
        if !self.caps.can_set_tracking {
            self.ctx.info(
                test,
                format!(
                    "Skipped because Tracking must be {} and CanSetTracking is False",
                    enabled
                ),
            );
            return false;
        }

        self.ctx
            .call_to_driver(test, &format!("Tracking = {}", enabled));
        match self.device.set_tracking(enabled).await {
            Ok(()) => true,
            Err(err) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    &format!(
                        "CanSetTracking is True but setting Tracking to {} failed",
                        enabled
                    ),
                );
                false
            }
        }
    }

    /// Poll Slewing until the mount stops.
    ///
    /// Keeps polling for at least the configured minimum wait unless the mount
    /// has already been seen slewing, for mounts that raise the flag late.
    async fn wait_for_slew(&mut self, test: &str) -> bool {
        let device = Arc::clone(&self.device);
        let start = Instant::now();
        let minimum = self.settings.slew_minimum_wait;
        let seen_slewing = AtomicBool::new(false);

        let result = self
            .ctx
            .wait_while(
                test,
                || {
                    let device = Arc::clone(&device);
                    let seen_slewing = &seen_slewing;
                    async move {
                        let slewing = device.slewing().await?;
                        if slewing {
                            seen_slewing.store(true, Ordering::Relaxed);
                        }
                        let early = start.elapsed() < minimum;
                        Ok(slewing || (early && !seen_slewing.load(Ordering::Relaxed)))
                    }
                },
                self.settings.maximum_slew_time,
            )
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                self.ctx
                    .report_wait_error(test, &err, "Waiting for the slew to finish");
                false
            }
        }
    }

    /// Slew with whichever coordinate slew the mount supports and wait for it to finish
    async fn slew_to(&mut self, test: &str, ra: f64, dec: f64) -> bool {
        let description = format!("Slewing to RA {} Dec {}", format_hms(ra), format_dms(dec));
        self.ctx.call_to_driver(test, &description);
        let result = if self.caps.can_slew_async {
            self.device.slew_to_coordinates_async(ra, dec).await
        } else if self.caps.can_slew {
            self.device.slew_to_coordinates(ra, dec).await
        } else {
            self.ctx.info(
                test,
                "Skipped because CanSlew and CanSlewAsync are both False",
            );
            return false;
        };

        if let Err(err) = result {
            self.ctx.handle_exception(
                test,
                MemberType::Method,
                Required::MustBeImplemented,
                &err,
                &description,
            );
            return false;
        }
        self.wait_for_slew(test).await
    }

    /// Poll AtPark until it reaches `parked`
    async fn wait_for_park_state(&mut self, test: &str, parked: bool) -> bool {
        let device = Arc::clone(&self.device);
        let result = self
            .ctx
            .wait_while(
                test,
                || {
                    let device = Arc::clone(&device);
                    async move { Ok(device.at_park().await? != parked || device.slewing().await?) }
                },
                self.settings.maximum_slew_time,
            )
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                let action = if parked {
                    "Waiting for AtPark to become True"
                } else {
                    "Waiting for AtPark to become False"
                };
                self.ctx.report_wait_error(test, &err, action);
                false
            }
        }
    }
}

/// Read a property, classifying any error against `test`
async fn read<T>(
    ctx: &mut TestContext,
    test: &str,
    required: Required,
    call: impl Future<Output = DeviceResult<T>>,
) -> Option<T> {
    ctx.call_to_driver(test, test);
    match call.await {
        Ok(value) => Some(value),
        Err(err) => {
            ctx.handle_exception(test, MemberType::Property, required, &err, test);
            None
        }
    }
}

/// Record OK when `value` lies in `[min, max]` (or `[min, max)`), Issue otherwise
fn check_range(
    ctx: &mut TestContext,
    test: &str,
    value: f64,
    min: f64,
    max: f64,
    max_inclusive: bool,
) -> bool {
    let below_max = if max_inclusive {
        value <= max
    } else {
        value < max
    };
    let in_range = value >= min && below_max;
    if in_range {
        ctx.ok(test, format!("{}", value));
    } else {
        let bracket = if max_inclusive { ']' } else { ')' };
        ctx.issue(
            test,
            format!(
                "{} is outside the valid range [{}, {}{}",
                value, min, max, bracket
            ),
        );
    }
    in_range
}

#[async_trait]
impl ConformanceTester for TelescopeTester {
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
        self.interface_version = identity.interface_version;
        if !identity.name.is_empty() {
            self.ctx.report.device = identity.name;
        }
        if self.ctx.cancelled() {
            return false;
        }

        let device = self.device.as_ref();
        let version = self.interface_version;
        self.caps = TelescopeCapabilities::read(&mut self.ctx, device, version).await;
        !self.ctx.cancelled()
    }

    async fn pre_run_check(&mut self) {
        let test = "Pre-run Check";
        self.site = SiteSnapshot {
            latitude: self.device.site_latitude().await.ok(),
            longitude: self.device.site_longitude().await.ok(),
            elevation: self.device.site_elevation().await.ok(),
        };

        if let Ok(true) = self.device.at_park().await {
            if self.caps.can_unpark {
                self.ctx.call_to_driver(test, "Unpark");
                match self.device.unpark().await {
                    Ok(()) => {
                        if self.wait_for_park_state(test, false).await {
                            self.ctx
                                .info(test, "Mount was parked, unparked it for testing");
                        }
                    }
                    Err(err) => {
                        self.ctx
                            .info(test, format!("Unable to unpark the mount: {}", err));
                        self.stuck_parked = true;
                    }
                }
            } else {
                self.ctx.info(
                    test,
                    "Mount is parked and CanUnpark is False, skipping tests that move it",
                );
                self.stuck_parked = true;
            }
        }
        if self.ctx.cancelled() {
            return;
        }

        if let Ok(true) = self.device.slewing().await {
            self.ctx
                .info(test, "Mount is slewing, waiting for it to stop");
            self.wait_for_slew(test).await;
        }

        if self.caps.can_set_tracking && !self.stuck_parked {
            if let Err(err) = self.device.set_tracking(true).await {
                self.ctx
                    .info(test, format!("Unable to enable tracking: {}", err));
            }
        }
    }

    async fn check_properties(&mut self) {
        self.check_telescope_properties().await;
    }

    async fn check_methods(&mut self) {
        self.check_telescope_methods().await;
    }

    async fn check_performance(&mut self) {
        for kind in PerformanceType::ALL {
            if self.ctx.cancelled() {
                return;
            }
            self.measure_performance(kind).await;
        }
    }

    async fn post_run_check(&mut self) {
        let test = "Post-run Check";

        if let Some(latitude) = self.site.latitude {
            if let Err(err) = self.device.set_site_latitude(latitude).await {
                self.ctx
                    .debug(test, format!("Could not restore SiteLatitude: {}", err));
            }
        }
        if let Some(longitude) = self.site.longitude {
            if let Err(err) = self.device.set_site_longitude(longitude).await {
                self.ctx
                    .debug(test, format!("Could not restore SiteLongitude: {}", err));
            }
        }
        if let Some(elevation) = self.site.elevation {
            if let Err(err) = self.device.set_site_elevation(elevation).await {
                self.ctx
                    .debug(test, format!("Could not restore SiteElevation: {}", err));
            }
        }

        if self.caps.can_set_tracking {
            if let Err(err) = self.device.set_tracking(false).await {
                self.ctx
                    .debug(test, format!("Could not stop tracking: {}", err));
            }
        }

        if self.settings.park_at_end && self.caps.can_park && !self.stuck_parked {
            self.ctx.call_to_driver(test, "Park");
            match self.device.park().await {
                Ok(()) => {
                    if self.wait_for_park_state(test, true).await {
                        self.ctx.info(test, "Mount parked");
                    }
                }
                Err(err) => self
                    .ctx
                    .info(test, format!("Unable to park the mount: {}", err)),
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneralConfig;
    use crate::report::Outcome;

    fn context() -> TestContext {
        TestContext::new("Test", &GeneralConfig::default(), CancellationToken::new())
    }

    #[test]
    fn range_check_inclusive_and_exclusive() {
        let mut ctx = context();
        let pole = check_range(&mut ctx, "Declination", 90.0, -90.0, 90.0, true);
        let wrapped = check_range(&mut ctx, "RightAscension", 24.0, 0.0, 24.0, false);
        let below = check_range(&mut ctx, "RightAscension", 23.99, 0.0, 24.0, false);

        assert!(pole);
        assert!(!wrapped);
        assert!(below);

        assert_eq!(ctx.report.count(Outcome::Ok), 2);
        assert_eq!(ctx.report.count(Outcome::Issue), 1);
        assert!(ctx.report.entries[1].message.contains("[0, 24)"));
    }
}
