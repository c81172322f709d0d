//! Telescope method checks

use std::sync::Arc;
use std::time::Instant;

use super::slew_sync::SlewSyncType;
use super::TelescopeTester;
use crate::astronomy::condition_ra;
use crate::classify::{ErrorKind, MemberType, Required};
use crate::device::{GuideDirection, TelescopeAxis};
use crate::error::DeviceResult;

/// Declination used for the calls made while parked
const PARKED_TEST_DECLINATION: f64 = 45.0;

/// Horizontal position used for the calls made while parked, as (azimuth, altitude)
const PARKED_TEST_ALT_AZ: (f64, f64) = (150.0, 50.0);

impl TelescopeTester {
    pub(super) async fn check_telescope_methods(&mut self) {
        run_checks!(self;
            self.check_abort_slew(),
            self.check_axis_rates(),
            self.check_find_home(),
            self.check_move_axis(TelescopeAxis::Primary),
            self.check_move_axis(TelescopeAxis::Secondary),
            self.check_move_axis(TelescopeAxis::Tertiary),
            self.check_pulse_guide(),
            self.check_slews_and_syncs(),
            self.check_pier_side(),
            self.check_extended(),
            self.check_park(),
        );
    }

    async fn check_abort_slew(&mut self) {
        let test = "AbortSlew";
        if !self.should_run(test, true) {
            return;
        }
        let required = if self.caps.can_slew_any() {
            Required::MustBeImplemented
        } else {
            Required::Optional
        };

        self.ctx.call_to_driver(test, test);
        match self.device.abort_slew().await {
            Ok(()) => self.ctx.ok(test, "AbortSlew completed while not slewing"),
            Err(err) => self
                .ctx
                .handle_exception(test, MemberType::Method, required, &err, "AbortSlew"),
        }
    }

    async fn check_axis_rates(&mut self) {
        let test = "AxisRates";
        let required = self.required_from(2);

        for axis in TelescopeAxis::ALL {
            self.ctx
                .call_to_driver(test, &format!("AxisRates({})", axis));
            let rates = match self.device.axis_rates(axis).await {
                Ok(rates) => rates,
                Err(err) => {
                    self.ctx.handle_exception(
                        test,
                        MemberType::Method,
                        required,
                        &err,
                        &format!("AxisRates({})", axis),
                    );
                    continue;
                }
            };

            let can_move = self.caps.can_move(axis);
            match (rates.is_empty(), can_move) {
                (true, true) => self.ctx.issue(
                    test,
                    format!(
                        "CanMoveAxis {} is True but AxisRates returned no rates",
                        axis
                    ),
                ),
                (true, false) => self.ctx.ok(
                    test,
                    format!("Empty axis rate returned for {} as expected", axis),
                ),
                (false, false) => self.ctx.issue(
                    test,
                    format!(
                        "CanMoveAxis {} is False but AxisRates returned {} rates",
                        axis,
                        rates.len()
                    ),
                ),
                (false, true) => {}
            }

            for rate in &rates {
                if rate.minimum < 0.0 || rate.maximum < 0.0 {
                    self.ctx.issue(
                        test,
                        format!(
                            "{} axis rate has a negative value: minimum {} maximum {}",
                            axis, rate.minimum, rate.maximum
                        ),
                    );
                } else if rate.minimum > rate.maximum {
                    self.ctx.issue(
                        test,
                        format!(
                            "{} axis rate minimum {} is greater than its maximum {}",
                            axis, rate.minimum, rate.maximum
                        ),
                    );
                } else {
                    self.ctx.ok(
                        test,
                        format!(
                            "{} axis rate minimum: {} maximum: {}",
                            axis, rate.minimum, rate.maximum
                        ),
                    );
                }
            }
        }
    }

    async fn check_find_home(&mut self) {
        let test = "FindHome";
        if !self.should_run(test, true) {
            return;
        }

        self.ctx.call_to_driver(test, test);
        let result = self.device.find_home().await;
        if self
            .ctx
            .check_gated(
                test,
                MemberType::Method,
                self.caps.can_find_home,
                "CanFindHome",
                result,
            )
            .is_none()
        {
            return;
        }
        if !self.wait_for_slew(test).await {
            return;
        }

        match self.device.at_home().await {
            Ok(true) => self.ctx.ok(test, "Found home OK"),
            Ok(false) => self
                .ctx
                .issue(test, "FindHome completed but AtHome is False"),
            Err(err) => self.ctx.handle_exception(
                test,
                MemberType::Property,
                Required::MustBeImplemented,
                &err,
                "Reading AtHome after FindHome",
            ),
        }
    }

    async fn check_move_axis(&mut self, axis: TelescopeAxis) {
        let test = format!("MoveAxis {}", axis);
        if !self.should_run("MoveAxis", true) {
            return;
        }

        if !self.caps.can_move(axis) {
            self.ctx
                .call_to_driver(&test, &format!("MoveAxis({}, 0)", axis));
            let result = self.device.move_axis(axis, 0.0).await;
            let gate = format!("CanMoveAxis {}", axis);
            self.ctx
                .check_gated(&test, MemberType::Method, false, &gate, result);
            return;
        }
        let capability = format!("CanMoveAxis {} is True", axis);

        let maximum = match self.device.axis_rates(axis).await {
            Ok(rates) if !rates.is_empty() => rates.iter().map(|r| r.maximum).fold(0.0, f64::max),
            _ => {
                self.ctx
                    .info(&test, "Skipped because AxisRates returned no usable rates");
                return;
            }
        };
        let tracking_before = self.device.tracking().await.ok();

        if !self.move_axis(&test, axis, 0.0, &capability).await {
            return;
        }
        self.ctx
            .ok(&test, "Can successfully set a movement rate of zero");

        for rate in [maximum, -maximum] {
            if !self.move_axis(&test, axis, rate, &capability).await {
                return;
            }
            let waited = self.ctx.wait_for(self.settings.move_axis_duration).await;
            let stopped = self.move_axis(&test, axis, 0.0, &capability).await;
            if let Err(err) = waited {
                self.ctx.report_wait_error(&test, &err, "Moving the axis");
                return;
            }
            if !stopped || !self.wait_for_slew(&test).await {
                return;
            }
            self.ctx.ok(
                &test,
                format!("Successfully moved the axis at {} degrees per second", rate),
            );
        }

        let excessive = maximum + 1.0;
        self.ctx
            .call_to_driver(&test, &format!("MoveAxis({}, {})", axis, excessive));
        match self.device.move_axis(axis, excessive).await {
            Ok(()) => {
                self.ctx.issue(
                    &test,
                    format!(
                        "A rate of {} above the maximum of {} was accepted",
                        excessive, maximum
                    ),
                );
                self.move_axis(&test, axis, 0.0, &capability).await;
            }
            Err(err) => self.ctx.handle_invalid_value_exception_as_ok(
                &test,
                MemberType::Method,
                Required::MustBeImplemented,
                &err,
                &format!("Moving at {} degrees per second", excessive),
                "Rate above the maximum correctly rejected",
            ),
        }

        if let Some(before) = tracking_before {
            match self.device.tracking().await {
                Ok(after) if after == before => self
                    .ctx
                    .ok(&test, "Tracking state is unchanged after MoveAxis"),
                Ok(after) => self.ctx.issue(
                    &test,
                    format!(
                        "Tracking changed from {} to {} during MoveAxis",
                        before, after
                    ),
                ),
                Err(err) => self
                    .ctx
                    .debug(&test, format!("Unable to read Tracking: {}", err)),
            }
        }
    }

    async fn move_axis(
        &mut self,
        test: &str,
        axis: TelescopeAxis,
        rate: f64,
        capability: &str,
    ) -> bool {
        self.ctx
            .call_to_driver(test, &format!("MoveAxis({}, {})", axis, rate));
        match self.device.move_axis(axis, rate).await {
            Ok(()) => true,
            Err(err) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Method,
                    Required::MustBeImplemented,
                    &err,
                    capability,
                );
                false
            }
        }
    }

    async fn check_pulse_guide(&mut self) {
        let test = "PulseGuide";
        if !self.should_run(test, true) {
            return;
        }
        let duration = self.settings.pulse_guide_duration;
        let duration_ms = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);

        if !self.caps.can_pulse_guide {
            self.ctx
                .call_to_driver(test, &format!("PulseGuide(North, {})", duration_ms));
            let north = GuideDirection::North;
            let result = self.device.pulse_guide(north, duration_ms).await;
            self.ctx
                .check_gated(test, MemberType::Method, false, "CanPulseGuide", result);
            return;
        }

        for direction in GuideDirection::ALL {
            if self.ctx.cancelled() {
                return;
            }
            self.ctx
                .call_to_driver(test, &format!("PulseGuide({}, {})", direction, duration_ms));
            let start = Instant::now();
            let result = self.device.pulse_guide(direction, duration_ms).await;
            if self
                .ctx
                .check_gated(test, MemberType::Method, true, "CanPulseGuide", result)
                .is_none()
            {
                return;
            }

            // A call that took most of the pulse duration is a synchronous implementation
            if start.elapsed() >= duration.mul_f64(0.75) {
                match self.device.is_pulse_guiding().await {
                    Ok(false) => self.ctx.ok(
                        test,
                        format!("Synchronous pulse guide {} found OK", direction),
                    ),
                    Ok(true) => self.ctx.issue(
                        test,
                        format!(
                            "Synchronous pulse guide {} returned while IsPulseGuiding is True",
                            direction
                        ),
                    ),
                    Err(err) => self.ctx.handle_exception(
                        test,
                        MemberType::Property,
                        Required::MustBeImplemented,
                        &err,
                        "CanPulseGuide is True",
                    ),
                }
                continue;
            }

            match self.device.is_pulse_guiding().await {
                Ok(true) => {}
                Ok(false) => {
                    self.ctx.issue(
                        test,
                        format!(
                            "Asynchronous pulse guide {} returned but IsPulseGuiding is False",
                            direction
                        ),
                    );
                    continue;
                }
                Err(err) => {
                    self.ctx.handle_exception(
                        test,
                        MemberType::Property,
                        Required::MustBeImplemented,
                        &err,
                        "CanPulseGuide is True",
                    );
                    return;
                }
            }

            let device = Arc::clone(&self.device);
            let result = self
                .ctx
                .wait_while(
                    test,
                    || {
                        let device = Arc::clone(&device);
                        async move { device.is_pulse_guiding().await }
                    },
                    duration + self.settings.pulse_guide_timeout,
                )
                .await;
            match result {
                Ok(_) => self.ctx.ok(
                    test,
                    format!("Asynchronous pulse guide {} found OK", direction),
                ),
                Err(err) => {
                    self.ctx
                        .report_wait_error(test, &err, "Waiting for IsPulseGuiding to clear");
                    return;
                }
            }
        }
    }

    async fn check_park(&mut self) {
        if !self.should_run("Park", true) {
            return;
        }
        self.check_set_park().await;

        let parked = self.check_park_and_rejections().await;
        if self.ctx.cancelled() {
            return;
        }
        self.check_unpark(parked).await;
    }

    /// SetPark is only exercised for its capability contract so the user's park position survives
    async fn check_set_park(&mut self) {
        let test = "SetPark";
        if self.caps.can_set_park {
            self.ctx
                .info(test, "Not called, to keep the mount's park position");
            return;
        }
        self.ctx.call_to_driver(test, test);
        let result = self.device.set_park().await;
        self.ctx
            .check_gated(test, MemberType::Method, false, "CanSetPark", result);
    }

    /// Park, then check that commands are rejected. Returns true when the mount ended up parked.
    async fn check_park_and_rejections(&mut self) -> bool {
        let test = "Park";
        self.ctx.call_to_driver(test, test);
        let result = self.device.park().await;
        if self
            .ctx
            .check_gated(
                test,
                MemberType::Method,
                self.caps.can_park,
                "CanPark",
                result,
            )
            .is_none()
        {
            return false;
        }
        if !self.wait_for_park_state(test, true).await {
            return false;
        }
        self.ctx.ok(test, "Mount parked successfully");

        self.ctx.call_to_driver(test, "Park while parked");
        match self.device.park().await {
            Ok(()) => self.ctx.ok(test, "Park while parked succeeded"),
            Err(err) => self.ctx.issue(
                test,
                format!(
                    "Calling Park while already parked should do nothing but returned: {}",
                    err
                ),
            ),
        }

        self.call_while_parked().await;
        true
    }

    async fn call_while_parked(&mut self) {
        let ra = condition_ra(self.sidereal_hours().await - 1.0);
        let dec = PARKED_TEST_DECLINATION;
        let (azimuth, altitude) = PARKED_TEST_ALT_AZ;

        // Targets must hold valid values so target commands fail for being parked
        if let Err(err) = self.device.set_target_right_ascension(ra).await {
            self.ctx.debug(
                "Park",
                format!("Unable to set TargetRightAscension: {}", err),
            );
        }
        if let Err(err) = self.device.set_target_declination(dec).await {
            self.ctx
                .debug("Park", format!("Unable to set TargetDeclination: {}", err));
        }

        for kind in SlewSyncType::ALL {
            if self.ctx.cancelled() {
                return;
            }
            if !kind.capability(&self.caps).0 {
                continue;
            }
            let (first, second) = match kind.frame() {
                super::Frame::Equatorial => (ra, dec),
                super::Frame::Horizontal => (azimuth, altitude),
            };
            let result = kind.invoke(self.device.as_ref(), first, second).await;
            self.expect_parked_rejection(kind.name(), result);
        }

        if self.caps.can_move(TelescopeAxis::Primary) {
            let result = self.device.move_axis(TelescopeAxis::Primary, 0.0).await;
            self.expect_parked_rejection("MoveAxis", result);
        }
        if self.caps.can_pulse_guide {
            let result = self.device.pulse_guide(GuideDirection::East, 0).await;
            self.expect_parked_rejection("PulseGuide", result);
        }
        if self.caps.can_find_home {
            let result = self.device.find_home().await;
            self.expect_parked_rejection("FindHome", result);
        }
        if self.caps.can_slew_any() {
            let result = self.device.abort_slew().await;
            self.expect_parked_rejection("AbortSlew", result);
        }
    }

    fn expect_parked_rejection(&mut self, member: &str, result: DeviceResult<()>) {
        let test = format!("{} While Parked", member);
        match result {
            Ok(()) => self.ctx.issue(
                &test,
                format!("{} succeeded while the mount is parked", member),
            ),
            Err(err) => match self.ctx.errors.kind(&err) {
                ErrorKind::InvalidWhileParked | ErrorKind::InvalidOperation => self
                    .ctx
                    .ok(&test, format!("{} was rejected while parked", member)),
                _ => self.ctx.handle_exception(
                    &test,
                    MemberType::Method,
                    Required::MustBeImplemented,
                    &err,
                    &format!("Calling {} while parked", member),
                ),
            },
        }
    }

    async fn check_unpark(&mut self, parked: bool) {
        let test = "Unpark";
        self.ctx.call_to_driver(test, test);
        let result = self.device.unpark().await;
        let unparked = self
            .ctx
            .check_gated(
                test,
                MemberType::Method,
                self.caps.can_unpark,
                "CanUnpark",
                result,
            )
            .is_some();

        if !parked {
            return;
        }
        if !unparked {
            self.stuck_parked = true;
            self.ctx
                .info(test, "The mount remains parked since Unpark failed");
            return;
        }
        if self.wait_for_park_state(test, false).await {
            self.ctx.ok(test, "Mount unparked successfully");
        }
    }
}
