//! Pier side behaviour of German equatorial mounts
//!
//! SideOfPier must report the pointing state, which changes when the mount
//! crosses the meridian, rather than the physical side of the pier the tube
//! is on, which changes at hour angle ±6. Slewing to hour angles -9, -3, +3
//! and +9 tells the two apart.

use std::fmt;

use super::TelescopeTester;
use crate::astronomy::{condition_ra, elevation, format_hms, pier_test_declination};
use crate::classify::{MemberType, Required};
use crate::device::PierSide;

const PIER_TEST_HOUR_ANGLES: [f64; 4] = [-9.0, -3.0, 3.0, 9.0];

/// Pier sides observed at one test position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideOfPierResults {
    pub side_of_pier: PierSide,
    pub destination_side_of_pier: PierSide,
}

impl Default for SideOfPierResults {
    fn default() -> Self {
        Self {
            side_of_pier: PierSide::Unknown,
            destination_side_of_pier: PierSide::Unknown,
        }
    }
}

/// What a set of pier side readings says about the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PierSideModel {
    PointingState,
    PhysicalPierSide,
    Inconclusive,
}

impl fmt::Display for PierSideModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PierSideModel::PointingState => write!(f, "pointing state"),
            PierSideModel::PhysicalPierSide => write!(f, "physical pier side"),
            PierSideModel::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Classify the sides seen at hour angles -9, -3, +3 and +9.
///
/// The pointing state flips only at the meridian so both hour angles on one
/// side agree. The physical side flips at ±6 hours so -3 matches +9 and +3
/// matches -9. Anything else, including an Unknown reading, is inconclusive.
pub fn classify_pier_side(
    minus_9: PierSide,
    minus_3: PierSide,
    plus_3: PierSide,
    plus_9: PierSide,
) -> PierSideModel {
    let sides = [minus_9, minus_3, plus_3, plus_9];
    if sides.contains(&PierSide::Unknown) || minus_3 == plus_3 {
        return PierSideModel::Inconclusive;
    }

    if minus_3 == minus_9 && plus_3 == plus_9 {
        PierSideModel::PointingState
    } else if minus_3 == plus_9 && plus_3 == minus_9 {
        PierSideModel::PhysicalPierSide
    } else {
        PierSideModel::Inconclusive
    }
}

fn describe_sides(sides: [PierSide; 4]) -> String {
    PIER_TEST_HOUR_ANGLES
        .iter()
        .zip(sides)
        .map(|(ha, side)| format!("HA {:+}: {}", ha, side))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TelescopeTester {
    /// "SideOfPier" in the skip list disables both tests, "SideOfPier Model"
    /// or "SideOfPier Write" only the one named
    pub(super) async fn check_pier_side(&mut self) {
        if !self.should_run("SideOfPier", true) {
            return;
        }
        self.check_pier_side_model().await;
        if self.ctx.cancelled() {
            return;
        }
        self.check_side_of_pier_write().await;
    }

    async fn check_pier_side_model(&mut self) {
        let test = "SideOfPier Model";
        if !self.settings.side_of_pier_tests {
            self.ctx.info(test, "Skipped by configuration");
            return;
        }
        if !self.is_german_mount() {
            self.ctx.info(
                test,
                "Skipped because the mount is not a German equatorial mount",
            );
            return;
        }
        if !self.should_run(test, false) {
            return;
        }
        if !self.ensure_tracking(test, true).await {
            return;
        }

        let latitude = self.site_latitude();
        let dec = pier_test_declination(latitude);
        let mut results = [SideOfPierResults::default(); 4];

        for (index, hour_angle) in PIER_TEST_HOUR_ANGLES.into_iter().enumerate() {
            if self.ctx.cancelled() {
                return;
            }
            let lst = self.sidereal_hours().await;
            let ra = condition_ra(lst - hour_angle);
            if elevation(ra, dec, lst, latitude) < 0.0 {
                self.ctx.info(
                    test,
                    format!(
                        "Hour angle {:+} is below the horizon at this site, slewing there anyway",
                        hour_angle
                    ),
                );
            }

            match self.device.destination_side_of_pier(ra, dec).await {
                Ok(side) => results[index].destination_side_of_pier = side,
                Err(err) if self.ctx.errors.is_not_implemented(&err) => {}
                Err(err) => self.ctx.handle_exception(
                    "DestinationSideOfPier",
                    MemberType::Method,
                    Required::Optional,
                    &err,
                    &format!("DestinationSideOfPier at hour angle {:+}", hour_angle),
                ),
            }

            if !self.slew_to(test, ra, dec).await {
                return;
            }

            match self.device.side_of_pier().await {
                Ok(side) => results[index].side_of_pier = side,
                Err(err) => {
                    self.ctx.handle_exception(
                        test,
                        MemberType::Property,
                        Required::Optional,
                        &err,
                        &format!("SideOfPier at hour angle {:+}", hour_angle),
                    );
                    return;
                }
            }
            tracing::debug!(
                "Pier side at HA {:+} (RA {}): {:?}",
                hour_angle,
                format_hms(ra),
                results[index]
            );

            let predicted = results[index].destination_side_of_pier;
            let actual = results[index].side_of_pier;
            if predicted != PierSide::Unknown && predicted != actual {
                self.ctx.issue(
                    "DestinationSideOfPier",
                    format!(
                        "Predicted {} for hour angle {:+} but the mount reports {} after the slew",
                        predicted, hour_angle, actual
                    ),
                );
            }
        }

        let sides = results.map(|r| r.side_of_pier);
        self.report_pier_model(test, "SideOfPier", sides);

        let destinations = results.map(|r| r.destination_side_of_pier);
        if destinations.contains(&PierSide::Unknown) {
            self.ctx.info(
                "DestinationSideOfPier",
                "Not classified because some positions returned no DestinationSideOfPier",
            );
        } else {
            self.report_pier_model(
                "DestinationSideOfPier",
                "DestinationSideOfPier",
                destinations,
            );
        }
    }

    fn report_pier_model(&mut self, test: &str, member: &str, sides: [PierSide; 4]) {
        let [minus_9, minus_3, plus_3, plus_9] = sides;
        let model = classify_pier_side(minus_9, minus_3, plus_3, plus_9);
        let observed = describe_sides(sides);
        match model {
            PierSideModel::PointingState => self.ctx.ok(
                test,
                format!("{} reports the pointing state ({})", member, observed),
            ),
            PierSideModel::PhysicalPierSide => self.ctx.issue(
                test,
                format!(
                    "{} reports the physical pier side instead of the pointing state ({})",
                    member, observed
                ),
            ),
            PierSideModel::Inconclusive => self.ctx.info(
                test,
                format!("Unable to determine what {} reports ({})", member, observed),
            ),
        }
    }

    async fn check_side_of_pier_write(&mut self) {
        let test = "SideOfPier Write";
        if !self.should_run(test, false) {
            return;
        }

        let current = self.device.side_of_pier().await;
        if !self.caps.can_set_pier_side {
            let side = match current {
                Ok(PierSide::Unknown) | Err(_) => PierSide::East,
                Ok(side) => side,
            };
            self.ctx
                .call_to_driver(test, &format!("SideOfPier = {}", side));
            let result = self.device.set_side_of_pier(side).await;
            self.ctx
                .check_gated(test, MemberType::Property, false, "CanSetPierSide", result);
            return;
        }

        let current = match current {
            Ok(PierSide::Unknown) => {
                self.ctx.info(test, "Skipped because SideOfPier is Unknown");
                return;
            }
            Ok(side) => side,
            Err(err) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    "CanSetPierSide is True",
                );
                return;
            }
        };

        for side in [current.opposite(), current] {
            self.ctx
                .call_to_driver(test, &format!("SideOfPier = {}", side));
            if let Err(err) = self.device.set_side_of_pier(side).await {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    "CanSetPierSide is True",
                );
                return;
            }
            if !self.wait_for_slew(test).await {
                return;
            }

            match self.device.side_of_pier().await {
                Ok(read_back) if read_back == side => {
                    self.ctx.ok(test, format!("Moved to pier side {}", side))
                }
                Ok(read_back) => self.ctx.issue(
                    test,
                    format!(
                        "SideOfPier was set to {} but reads back as {}",
                        side, read_back
                    ),
                ),
                Err(err) => self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    "Reading SideOfPier after setting it",
                ),
            }
        }
    }
}
