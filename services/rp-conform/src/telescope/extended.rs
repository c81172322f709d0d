//! Extended motion tests
//!
//! Measure how far the mount actually moves under a rate offset or a pulse
//! guide and compare it with the distance the commanded rate implies.

use std::sync::Arc;
use std::time::Instant;

use super::TelescopeTester;
use crate::astronomy::{condition_ra, get_test_declination, ra_change_hours, SIDEREAL_RATE};
use crate::classify::{MemberType, Required};
use crate::device::GuideDirection;

/// Hour angle of the position the extended tests run at
const TEST_HOUR_ANGLE: f64 = 1.0;

/// How a measured displacement compares with the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Displacement {
    WithinTolerance,
    WrongDirection,
    OutOfTolerance,
}

/// Compare signed displacements, `tolerance_pct` being a percentage of `expected`
pub fn compare_displacement(expected: f64, measured: f64, tolerance_pct: f64) -> Displacement {
    if expected * measured < 0.0 {
        Displacement::WrongDirection
    } else if (measured - expected).abs() <= expected.abs() * tolerance_pct / 100.0 {
        Displacement::WithinTolerance
    } else {
        Displacement::OutOfTolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    RightAscension,
    Declination,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Axis::RightAscension => "RightAscension",
            Axis::Declination => "Declination",
        }
    }
}

impl TelescopeTester {
    pub(super) async fn check_extended(&mut self) {
        if self.settings.extended_rate_offset_tests {
            self.check_rate_offsets().await;
        } else {
            self.ctx
                .debug("Rate Offsets", "Extended rate offset tests are disabled");
        }
        if self.ctx.cancelled() {
            return;
        }

        if self.settings.extended_pulse_guide_tests {
            self.check_pulse_guide_distances().await;
        } else {
            self.ctx.debug(
                "PulseGuide Distance",
                "Extended pulse guide tests are disabled",
            );
        }
    }

    /// Slew to a position clear of the pole and the horizon with tracking on
    async fn move_to_test_position(&mut self, test: &str) -> bool {
        if !self.should_run(test, true) || !self.ensure_tracking(test, true).await {
            return false;
        }
        let lst = self.sidereal_hours().await;
        let ra = condition_ra(lst - TEST_HOUR_ANGLE);
        match get_test_declination(ra, lst, self.site_latitude()) {
            Ok(dec) => self.slew_to(test, ra, dec).await,
            Err(err) => {
                self.ctx.info(test, format!("Skipped: {}", err));
                false
            }
        }
    }

    /// Current (RA hours, Dec degrees)
    async fn read_position(&mut self, test: &str) -> Option<(f64, f64)> {
        let position = (
            self.device.right_ascension().await,
            self.device.declination().await,
        );
        match position {
            (Ok(ra), Ok(dec)) => Some((ra, dec)),
            (Err(err), _) | (_, Err(err)) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::Mandatory,
                    &err,
                    "Reading the position",
                );
                None
            }
        }
    }

    async fn check_rate_offsets(&mut self) {
        let test = "Rate Offsets";
        if !self.caps.can_set_right_ascension_rate && !self.caps.can_set_declination_rate {
            self.ctx.info(
                test,
                "Skipped because CanSetRightAscensionRate and CanSetDeclinationRate are both False",
            );
            return;
        }
        if !self.move_to_test_position(test).await {
            return;
        }

        if self.caps.can_set_right_ascension_rate {
            let offset = self.settings.ra_rate_offset;
            for rate in [offset, -offset] {
                if self.ctx.cancelled()
                    || !self.measure_rate_offset(Axis::RightAscension, rate).await
                {
                    break;
                }
            }
        }
        if self.caps.can_set_declination_rate {
            let offset = self.settings.dec_rate_offset;
            for rate in [offset, -offset] {
                if self.ctx.cancelled()
                    || !self.measure_rate_offset(Axis::Declination, rate).await
                {
                    break;
                }
            }
        }
    }

    /// Apply one rate offset for the configured time and check the distance moved
    async fn measure_rate_offset(&mut self, axis: Axis, rate: f64) -> bool {
        let test = match axis {
            Axis::RightAscension => "RightAscensionRate Offset",
            Axis::Declination => "DeclinationRate Offset",
        };

        let Some((start_ra, start_dec)) = self.read_position(test).await else {
            return false;
        };
        let start = Instant::now();
        if !self.set_rate_offset(test, axis, rate).await {
            return false;
        }

        let waited = self.ctx.wait_for(self.settings.rate_offset_duration).await;
        let end = self.read_position(test).await;
        let elapsed = start.elapsed().as_secs_f64();
        self.set_rate_offset(test, axis, 0.0).await;
        if let Err(err) = waited {
            self.ctx
                .report_wait_error(test, &err, "Waiting for the rate offset");
            return false;
        }
        let Some((end_ra, end_dec)) = end else {
            return false;
        };

        // RightAscensionRate is RA seconds per sidereal second,
        // DeclinationRate arc-seconds per SI second
        let (expected, measured) = match axis {
            Axis::RightAscension => (
                rate * elapsed / SIDEREAL_RATE * 15.0,
                ra_change_hours(start_ra, end_ra) * 15.0 * 3600.0,
            ),
            Axis::Declination => (rate * elapsed, (end_dec - start_dec) * 3600.0),
        };

        let tolerance = self.settings.rate_offset_tolerance_pct;
        self.report_displacement(test, axis, expected, measured, tolerance);
        true
    }

    async fn set_rate_offset(&mut self, test: &str, axis: Axis, rate: f64) -> bool {
        let result = match axis {
            Axis::RightAscension => {
                self.ctx
                    .call_to_driver(test, &format!("RightAscensionRate = {}", rate));
                self.device.set_right_ascension_rate(rate).await
            }
            Axis::Declination => {
                self.ctx
                    .call_to_driver(test, &format!("DeclinationRate = {}", rate));
                self.device.set_declination_rate(rate).await
            }
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    &format!("Setting the {} rate offset to {}", axis.name(), rate),
                );
                false
            }
        }
    }

    async fn check_pulse_guide_distances(&mut self) {
        let test = "PulseGuide Distance";
        if !self.caps.can_pulse_guide {
            self.ctx
                .info(test, "Skipped because CanPulseGuide is False");
            return;
        }
        if !self.move_to_test_position(test).await {
            return;
        }

        let rates = (
            self.device.guide_rate_right_ascension().await,
            self.device.guide_rate_declination().await,
        );
        let (ra_rate, dec_rate) = match rates {
            (Ok(ra_rate), Ok(dec_rate)) => (ra_rate, dec_rate),
            (Err(err), _) | (_, Err(err)) => {
                self.ctx.info(
                    test,
                    format!("Skipped because the guide rates could not be read: {}", err),
                );
                return;
            }
        };

        for direction in GuideDirection::ALL {
            if self.ctx.cancelled() {
                return;
            }
            let guide_rate = match direction {
                GuideDirection::North | GuideDirection::South => dec_rate,
                GuideDirection::East | GuideDirection::West => ra_rate,
            };
            if !self.measure_pulse_guide(direction, guide_rate).await {
                return;
            }
        }
    }

    /// Guide in one direction and check the distance moved on both axes
    async fn measure_pulse_guide(&mut self, direction: GuideDirection, guide_rate: f64) -> bool {
        let test = "PulseGuide Distance";
        let duration = self.settings.extended_pulse_guide_duration;
        let duration_ms = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);

        let Some((start_ra, start_dec)) = self.read_position(test).await else {
            return false;
        };

        self.ctx
            .call_to_driver(test, &format!("PulseGuide({}, {})", direction, duration_ms));
        if let Err(err) = self.device.pulse_guide(direction, duration_ms).await {
            self.ctx.handle_exception(
                test,
                MemberType::Method,
                Required::MustBeImplemented,
                &err,
                "CanPulseGuide is True",
            );
            return false;
        }

        let device = Arc::clone(&self.device);
        let timeout = duration + self.settings.pulse_guide_timeout;
        if let Err(err) = self
            .ctx
            .wait_while(
                test,
                || {
                    let device = Arc::clone(&device);
                    async move { device.is_pulse_guiding().await }
                },
                timeout,
            )
            .await
        {
            self.ctx
                .report_wait_error(test, &err, "Waiting for IsPulseGuiding to clear");
            return false;
        }

        let Some((end_ra, end_dec)) = self.read_position(test).await else {
            return false;
        };
        let ra_moved = ra_change_hours(start_ra, end_ra) * 15.0 * 3600.0;
        let dec_moved = (end_dec - start_dec) * 3600.0;

        let distance = guide_rate * duration.as_secs_f64() * 3600.0;
        let (axis, sign) = match direction {
            GuideDirection::North => (Axis::Declination, 1.0),
            GuideDirection::South => (Axis::Declination, -1.0),
            GuideDirection::East => (Axis::RightAscension, 1.0),
            GuideDirection::West => (Axis::RightAscension, -1.0),
        };
        let (measured, cross_axis, cross_moved) = match axis {
            Axis::Declination => (dec_moved, Axis::RightAscension, ra_moved),
            Axis::RightAscension => (ra_moved, Axis::Declination, dec_moved),
        };

        let label = format!("PulseGuide {}", direction);
        let tolerance = self.settings.pulse_guide_tolerance_pct;
        self.report_displacement(&label, axis, sign * distance, measured, tolerance);

        let cross_tolerance = self.settings.cross_axis_tolerance_arcsec;
        if cross_moved.abs() > cross_tolerance {
            self.ctx.issue(
                &label,
                format!(
                    "{} moved {:.2}\" while guiding {}, more than the {:.1}\" allowed",
                    cross_axis.name(),
                    cross_moved,
                    direction,
                    cross_tolerance
                ),
            );
        } else {
            self.ctx.ok(
                &label,
                format!(
                    "{} stayed within {:.1}\" ({:.2}\")",
                    cross_axis.name(),
                    cross_tolerance,
                    cross_moved
                ),
            );
        }
        true
    }

    fn report_displacement(
        &mut self,
        test: &str,
        axis: Axis,
        expected: f64,
        measured: f64,
        tolerance_pct: f64,
    ) {
        let summary = format!(
            "{} moved {:.2}\", expected {:.2}\"",
            axis.name(),
            measured,
            expected
        );
        match compare_displacement(expected, measured, tolerance_pct) {
            Displacement::WithinTolerance => self
                .ctx
                .ok(test, format!("{} (within {}%)", summary, tolerance_pct)),
            Displacement::WrongDirection => self.ctx.issue(
                test,
                format!("{}, the mount moved in the wrong direction", summary),
            ),
            Displacement::OutOfTolerance => self.ctx.issue(
                test,
                format!("{}, outside the {}% tolerance", summary, tolerance_pct),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_within_tolerance() {
        assert_eq!(
            compare_displacement(100.0, 104.0, 5.0),
            Displacement::WithinTolerance
        );
        assert_eq!(
            compare_displacement(-100.0, -96.0, 5.0),
            Displacement::WithinTolerance
        );
    }

    #[test]
    fn displacement_in_the_wrong_direction() {
        assert_eq!(
            compare_displacement(100.0, -100.0, 5.0),
            Displacement::WrongDirection
        );
        assert_eq!(
            compare_displacement(-7.5, 7.5, 50.0),
            Displacement::WrongDirection
        );
    }

    #[test]
    fn displacement_out_of_tolerance() {
        assert_eq!(
            compare_displacement(100.0, 110.0, 5.0),
            Displacement::OutOfTolerance
        );
        assert_eq!(
            compare_displacement(100.0, 0.0, 5.0),
            Displacement::OutOfTolerance
        );
    }

    #[test]
    fn sidereal_rate_offset_arithmetic() {
        // One RA second per sidereal second for ten SI seconds
        let expected = 1.0 * 10.0 / SIDEREAL_RATE * 15.0;
        assert!((expected - 150.41).abs() < 0.01);
    }
}
