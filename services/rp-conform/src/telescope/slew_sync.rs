//! Slew and sync commands
//!
//! Every variant goes through the same sequence: put tracking into the state
//! its frame needs, issue the command, wait for async slews, check the mount
//! arrived, check the target side effect and finally test the rejection of
//! out of range coordinates.

use super::capabilities::TelescopeCapabilities;
use super::TelescopeTester;
use crate::astronomy::{
    az_difference_arcsec, condition_azimuth, condition_ra, dec_difference_arcsec, format_dms,
    format_hms, get_test_declination, ra_difference_arcsec,
};
use crate::classify::{MemberType, Required};
use crate::device::TelescopeDevice;
use crate::error::DeviceResult;

/// Alt/Az positions used by the horizontal slews, as (azimuth, altitude)
const ALT_AZ_SLEW_TARGETS: [(f64, f64); 2] = [(150.0, 50.0), (210.0, 55.0)];

/// Offsets applied to the current position by the sync tests
const SYNC_RA_OFFSET_HOURS: f64 = 1.0 / 60.0;
const SYNC_ANGLE_OFFSET_DEGREES: f64 = 0.25;

/// Coordinate frame a command works in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Equatorial,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Slew,
    AsyncSlew,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlewSyncType {
    SlewToCoordinates,
    SlewToCoordinatesAsync,
    SlewToTarget,
    SlewToTargetAsync,
    SyncToCoordinates,
    SyncToTarget,
    SlewToAltAz,
    SlewToAltAzAsync,
    SyncToAltAz,
}

impl SlewSyncType {
    /// Run order; equatorial slews come first so the syncs start from a sensible position
    pub const ALL: [SlewSyncType; 9] = [
        SlewSyncType::SlewToCoordinates,
        SlewSyncType::SlewToCoordinatesAsync,
        SlewSyncType::SlewToTarget,
        SlewSyncType::SlewToTargetAsync,
        SlewSyncType::SyncToCoordinates,
        SlewSyncType::SyncToTarget,
        SlewSyncType::SlewToAltAz,
        SlewSyncType::SlewToAltAzAsync,
        SlewSyncType::SyncToAltAz,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SlewSyncType::SlewToCoordinates => "SlewToCoordinates",
            SlewSyncType::SlewToCoordinatesAsync => "SlewToCoordinatesAsync",
            SlewSyncType::SlewToTarget => "SlewToTarget",
            SlewSyncType::SlewToTargetAsync => "SlewToTargetAsync",
            SlewSyncType::SyncToCoordinates => "SyncToCoordinates",
            SlewSyncType::SyncToTarget => "SyncToTarget",
            SlewSyncType::SlewToAltAz => "SlewToAltAz",
            SlewSyncType::SlewToAltAzAsync => "SlewToAltAzAsync",
            SlewSyncType::SyncToAltAz => "SyncToAltAz",
        }
    }

    /// The capability flag gating this command and its name
    pub fn capability(self, caps: &TelescopeCapabilities) -> (bool, &'static str) {
        match self {
            SlewSyncType::SlewToCoordinates | SlewSyncType::SlewToTarget => {
                (caps.can_slew, "CanSlew")
            }
            SlewSyncType::SlewToCoordinatesAsync | SlewSyncType::SlewToTargetAsync => {
                (caps.can_slew_async, "CanSlewAsync")
            }
            SlewSyncType::SyncToCoordinates | SlewSyncType::SyncToTarget => {
                (caps.can_sync, "CanSync")
            }
            SlewSyncType::SlewToAltAz => (caps.can_slew_alt_az, "CanSlewAltAz"),
            SlewSyncType::SlewToAltAzAsync => (caps.can_slew_alt_az_async, "CanSlewAltAzAsync"),
            SlewSyncType::SyncToAltAz => (caps.can_sync_alt_az, "CanSyncAltAz"),
        }
    }

    pub fn frame(self) -> Frame {
        match self {
            SlewSyncType::SlewToAltAz
            | SlewSyncType::SlewToAltAzAsync
            | SlewSyncType::SyncToAltAz => Frame::Horizontal,
            _ => Frame::Equatorial,
        }
    }

    fn kind(self) -> CommandKind {
        match self {
            SlewSyncType::SlewToCoordinates
            | SlewSyncType::SlewToTarget
            | SlewSyncType::SlewToAltAz => CommandKind::Slew,
            SlewSyncType::SlewToCoordinatesAsync
            | SlewSyncType::SlewToTargetAsync
            | SlewSyncType::SlewToAltAzAsync => CommandKind::AsyncSlew,
            SlewSyncType::SyncToCoordinates
            | SlewSyncType::SyncToTarget
            | SlewSyncType::SyncToAltAz => CommandKind::Sync,
        }
    }

    pub fn is_sync(self) -> bool {
        self.kind() == CommandKind::Sync
    }

    /// Commands that take their coordinates from TargetRightAscension and TargetDeclination
    pub fn uses_target(self) -> bool {
        matches!(
            self,
            SlewSyncType::SlewToTarget
                | SlewSyncType::SlewToTargetAsync
                | SlewSyncType::SyncToTarget
        )
    }

    /// Hour angle of the equatorial slew destination
    fn hour_angle(self) -> f64 {
        match self {
            SlewSyncType::SlewToCoordinates => 1.0,
            SlewSyncType::SlewToCoordinatesAsync => -1.0,
            SlewSyncType::SlewToTarget => 2.0,
            _ => -2.0,
        }
    }

    /// Issue the command.
    ///
    /// `first` and `second` are RA and Dec for the equatorial frame, azimuth
    /// and altitude for the horizontal one. Target commands ignore them.
    pub(super) async fn invoke(
        self,
        device: &dyn TelescopeDevice,
        first: f64,
        second: f64,
    ) -> DeviceResult<()> {
        match self {
            SlewSyncType::SlewToCoordinates => device.slew_to_coordinates(first, second).await,
            SlewSyncType::SlewToCoordinatesAsync => {
                device.slew_to_coordinates_async(first, second).await
            }
            SlewSyncType::SlewToTarget => device.slew_to_target().await,
            SlewSyncType::SlewToTargetAsync => device.slew_to_target_async().await,
            SlewSyncType::SyncToCoordinates => device.sync_to_coordinates(first, second).await,
            SlewSyncType::SyncToTarget => device.sync_to_target().await,
            SlewSyncType::SlewToAltAz => device.slew_to_alt_az(first, second).await,
            SlewSyncType::SlewToAltAzAsync => device.slew_to_alt_az_async(first, second).await,
            SlewSyncType::SyncToAltAz => device.sync_to_alt_az(first, second).await,
        }
    }
}

impl std::fmt::Display for SlewSyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Move a sync coordinate a little, towards the middle of its range
fn nudge(value: f64, middle: f64) -> f64 {
    if value > middle {
        value - SYNC_ANGLE_OFFSET_DEGREES
    } else {
        value + SYNC_ANGLE_OFFSET_DEGREES
    }
}

impl TelescopeTester {
    pub(super) async fn check_slews_and_syncs(&mut self) {
        for kind in SlewSyncType::ALL {
            if self.ctx.cancelled() {
                return;
            }
            self.check_slew_sync(kind).await;
        }
    }

    async fn check_slew_sync(&mut self, kind: SlewSyncType) {
        let name = kind.name();
        if !self.should_run(name, true) {
            return;
        }

        let (capable, capability_name) = kind.capability(&self.caps);
        if !capable {
            let (first, second) = match kind.frame() {
                Frame::Equatorial => (condition_ra(self.sidereal_hours().await - 1.0), 45.0),
                Frame::Horizontal => ALT_AZ_SLEW_TARGETS[0],
            };
            self.ctx.call_to_driver(name, name);
            let result = kind.invoke(self.device.as_ref(), first, second).await;
            self.ctx
                .check_gated(name, MemberType::Method, false, capability_name, result);
            return;
        }

        let equatorial = kind.frame() == Frame::Equatorial;
        if !self.ensure_tracking(name, equatorial).await {
            return;
        }

        let Some((first, second)) = self.pick_destination(kind).await else {
            return;
        };
        let origin = if kind.is_sync() {
            self.current_position(kind.frame()).await
        } else {
            None
        };

        if kind.uses_target() && !self.set_targets(name, first, second).await {
            return;
        }

        let description = describe(kind, first, second);
        self.ctx.call_to_driver(name, &description);
        let result = kind.invoke(self.device.as_ref(), first, second).await;
        if let Err(err) = result {
            self.ctx.handle_exception(
                name,
                MemberType::Method,
                Required::MustBeImplemented,
                &err,
                &format!("{} is True", capability_name),
            );
            return;
        }

        match kind.kind() {
            CommandKind::Slew => {
                if let Ok(true) = self.device.slewing().await {
                    self.ctx
                        .issue(name, "Slewing is True after the synchronous slew returned");
                    if !self.wait_for_slew(name).await {
                        return;
                    }
                }
            }
            CommandKind::AsyncSlew => {
                if !self.wait_for_slew(name).await {
                    return;
                }
            }
            CommandKind::Sync => {}
        }

        self.verify_position(kind, first, second).await;
        if kind.frame() == Frame::Equatorial && !kind.uses_target() {
            self.verify_target_side_effect(kind, first, second).await;
        }

        if let Some((first, second)) = origin {
            // Undo the deliberate offset so later tests start from the true position
            let restore = kind_for_restore(kind);
            self.resync(name, restore, first, second).await;
        }

        if !kind.uses_target() {
            self.try_bad_coordinates(kind, first, second, origin).await;
        }
    }

    /// Destination of the command, `None` when no usable position exists
    async fn pick_destination(&mut self, kind: SlewSyncType) -> Option<(f64, f64)> {
        let name = kind.name();
        match (kind.frame(), kind.kind()) {
            (Frame::Equatorial, CommandKind::Sync) => {
                let (ra, dec) = self.current_position(Frame::Equatorial).await?;
                Some((condition_ra(ra - SYNC_RA_OFFSET_HOURS), nudge(dec, 0.0)))
            }
            (Frame::Horizontal, CommandKind::Sync) => {
                let (azimuth, altitude) = self.current_position(Frame::Horizontal).await?;
                Some((
                    condition_azimuth(azimuth + SYNC_ANGLE_OFFSET_DEGREES),
                    nudge(altitude, 45.0),
                ))
            }
            (Frame::Equatorial, _) => {
                let lst = self.sidereal_hours().await;
                let ra = condition_ra(lst - kind.hour_angle());
                match get_test_declination(ra, lst, self.site_latitude()) {
                    Ok(dec) => Some((ra, dec)),
                    Err(err) => {
                        self.ctx.info(name, format!("Skipped: {}", err));
                        None
                    }
                }
            }
            (Frame::Horizontal, command) => {
                let index = usize::from(command == CommandKind::AsyncSlew);
                Some(ALT_AZ_SLEW_TARGETS[index])
            }
        }
    }

    /// Current (RA, Dec) or (azimuth, altitude)
    async fn current_position(&mut self, frame: Frame) -> Option<(f64, f64)> {
        let (first, second) = match frame {
            Frame::Equatorial => (
                self.device.right_ascension().await,
                self.device.declination().await,
            ),
            Frame::Horizontal => (self.device.azimuth().await, self.device.altitude().await),
        };
        match (first, second) {
            (Ok(first), Ok(second)) => Some((first, second)),
            (Err(err), _) | (_, Err(err)) => {
                self.ctx.handle_exception(
                    "Current Position",
                    MemberType::Property,
                    Required::Mandatory,
                    &err,
                    "Reading the current position",
                );
                None
            }
        }
    }

    async fn set_targets(&mut self, test: &str, ra: f64, dec: f64) -> bool {
        self.ctx
            .call_to_driver(test, &format!("TargetRightAscension = {}", format_hms(ra)));
        let result = match self.device.set_target_right_ascension(ra).await {
            Ok(()) => {
                self.ctx
                    .call_to_driver(test, &format!("TargetDeclination = {}", format_dms(dec)));
                self.device.set_target_declination(dec).await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    &format!("Setting the target for {}", test),
                );
                false
            }
        }
    }

    async fn verify_position(&mut self, kind: SlewSyncType, first: f64, second: f64) {
        let name = kind.name();
        let tolerance = self.settings.slew_tolerance_arcsec;
        let verb = if kind.is_sync() { "Synced" } else { "Slewed" };
        let Some((actual_first, actual_second)) = self.current_position(kind.frame()).await else {
            return;
        };

        let (first_error, second_error, description) = match kind.frame() {
            Frame::Equatorial => (
                ra_difference_arcsec(actual_first, first),
                dec_difference_arcsec(actual_second, second),
                format!(
                    "RA {} Dec {} (expected RA {} Dec {})",
                    format_hms(actual_first),
                    format_dms(actual_second),
                    format_hms(first),
                    format_dms(second)
                ),
            ),
            Frame::Horizontal => (
                az_difference_arcsec(actual_first, first),
                dec_difference_arcsec(actual_second, second),
                format!(
                    "Azimuth {} Altitude {} (expected Azimuth {} Altitude {})",
                    format_dms(actual_first),
                    format_dms(actual_second),
                    format_dms(first),
                    format_dms(second)
                ),
            ),
        };

        if first_error <= tolerance && second_error <= tolerance {
            self.ctx.ok(
                name,
                format!(
                    "{} to within {:.1}\" and {:.1}\" of the requested position",
                    verb, first_error, second_error
                ),
            );
        } else {
            self.ctx.issue(
                name,
                format!(
                    "{} to {}, differences {:.1}\" and {:.1}\" exceed the {:.1}\" tolerance",
                    verb, description, first_error, second_error, tolerance
                ),
            );
        }
    }

    /// Coordinate slews and syncs should leave the target set to their coordinates
    async fn verify_target_side_effect(&mut self, kind: SlewSyncType, ra: f64, dec: f64) {
        let test = format!("{} Target", kind.name());
        let tolerance = self.settings.slew_tolerance_arcsec;

        let target_ra = self.device.target_right_ascension().await;
        let target_dec = self.device.target_declination().await;
        match (target_ra, target_dec) {
            (Ok(target_ra), Ok(target_dec)) => {
                if ra_difference_arcsec(target_ra, ra) <= tolerance
                    && dec_difference_arcsec(target_dec, dec) <= tolerance
                {
                    self.ctx.ok(
                        &test,
                        "TargetRightAscension and TargetDeclination match the coordinates",
                    );
                } else {
                    self.ctx.issue(
                        &test,
                        format!(
                            "Target is RA {} Dec {} but the command used RA {} Dec {}",
                            format_hms(target_ra),
                            format_dms(target_dec),
                            format_hms(ra),
                            format_dms(dec)
                        ),
                    );
                }
            }
            (Err(err), _) | (_, Err(err)) if self.ctx.errors.is_not_set(&err) => {
                let message = format!(
                    "{} did not set TargetRightAscension and TargetDeclination",
                    kind.name()
                );
                if self.interface_version >= 4 {
                    self.ctx.issue(&test, message);
                } else {
                    self.ctx.info(&test, message);
                }
            }
            (Err(err), _) | (_, Err(err)) => self.ctx.handle_exception(
                &test,
                MemberType::Property,
                Required::MustBeImplemented,
                &err,
                "Reading the target after a slew or sync",
            ),
        }
    }

    /// Out of range coordinates must be rejected. A sync that accepts one is
    /// undone by syncing back to `origin`.
    async fn try_bad_coordinates(
        &mut self,
        kind: SlewSyncType,
        first: f64,
        second: f64,
        origin: Option<(f64, f64)>,
    ) {
        let test = format!("{} Bad Coordinates", kind.name());
        let attempts = match kind.frame() {
            Frame::Equatorial => [
                (-1.0, second, "RightAscension -1"),
                (25.0, second, "RightAscension 25"),
                (first, -100.0, "Declination -100"),
                (first, 100.0, "Declination 100"),
            ],
            Frame::Horizontal => [
                (-10.0, second, "Azimuth -10"),
                (370.0, second, "Azimuth 370"),
                (first, -100.0, "Altitude -100"),
                (first, 100.0, "Altitude 100"),
            ],
        };

        for (bad_first, bad_second, label) in attempts {
            if self.ctx.cancelled() {
                return;
            }
            self.ctx
                .call_to_driver(&test, &describe(kind, bad_first, bad_second));
            let device = self.device.as_ref();
            match kind.invoke(device, bad_first, bad_second).await {
                Ok(()) => {
                    self.ctx
                        .issue(&test, format!("Invalid coordinate {} was accepted", label));
                    if let Some((origin_first, origin_second)) = origin {
                        self.resync(&test, kind, origin_first, origin_second).await;
                    } else if !kind.is_sync() {
                        self.wait_for_slew(&test).await;
                    }
                }
                Err(err) => self.ctx.handle_invalid_value_exception_as_ok(
                    &test,
                    MemberType::Method,
                    Required::MustBeImplemented,
                    &err,
                    &format!("Calling {} with {}", kind.name(), label),
                    &format!("Correctly rejected {}", label),
                ),
            }
        }
    }

    async fn resync(&mut self, test: &str, kind: SlewSyncType, first: f64, second: f64) {
        self.ctx
            .call_to_driver(test, &describe(kind, first, second));
        match kind.invoke(self.device.as_ref(), first, second).await {
            Ok(()) => self.ctx.debug(test, "Synced back to the starting position"),
            Err(err) => self.ctx.debug(
                test,
                format!(
                    "Unable to restore the position after an accepted sync: {}",
                    err
                ),
            ),
        }
    }
}

/// SyncToTarget is restored with a coordinate sync, its target holds the offset position
fn kind_for_restore(kind: SlewSyncType) -> SlewSyncType {
    match kind {
        SlewSyncType::SyncToTarget => SlewSyncType::SyncToCoordinates,
        other => other,
    }
}

fn describe(kind: SlewSyncType, first: f64, second: f64) -> String {
    match (kind.frame(), kind.uses_target()) {
        (_, true) => kind.name().to_string(),
        (Frame::Equatorial, false) => format!(
            "{}({}, {})",
            kind.name(),
            format_hms(first),
            format_dms(second)
        ),
        (Frame::Horizontal, false) => format!("{}({:.3}, {:.3})", kind.name(), first, second),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names_follow_the_command() {
        let caps = TelescopeCapabilities {
            can_slew_async: true,
            ..Default::default()
        };
        assert_eq!(
            SlewSyncType::SlewToTargetAsync.capability(&caps),
            (true, "CanSlewAsync")
        );
        assert_eq!(
            SlewSyncType::SyncToAltAz.capability(&caps),
            (false, "CanSyncAltAz")
        );
        assert_eq!(
            SlewSyncType::SlewToTarget.capability(&caps),
            (false, "CanSlew")
        );
    }

    #[test]
    fn frames_and_kinds() {
        assert_eq!(SlewSyncType::SlewToAltAzAsync.frame(), Frame::Horizontal);
        assert_eq!(SlewSyncType::SyncToTarget.frame(), Frame::Equatorial);
        assert!(SlewSyncType::SyncToAltAz.is_sync());
        assert!(!SlewSyncType::SlewToCoordinatesAsync.is_sync());
        assert!(SlewSyncType::SyncToTarget.uses_target());
        assert!(!SlewSyncType::SyncToCoordinates.uses_target());
    }

    #[test]
    fn syncs_run_after_equatorial_slews() {
        let first_sync = SlewSyncType::ALL.iter().position(|k| k.is_sync()).unwrap();
        assert!(SlewSyncType::ALL[..first_sync]
            .iter()
            .all(|k| k.frame() == Frame::Equatorial && !k.is_sync()));
    }

    #[test]
    fn nudge_moves_towards_the_middle() {
        assert!((nudge(89.9, 0.0) - 89.65).abs() < 1e-9);
        assert!((nudge(-89.9, 0.0) + 89.65).abs() < 1e-9);
        assert_eq!(nudge(10.0, 45.0), 10.25);
    }

    #[test]
    fn restore_uses_a_coordinate_sync() {
        assert_eq!(
            kind_for_restore(SlewSyncType::SyncToTarget),
            SlewSyncType::SyncToCoordinates
        );
        assert_eq!(
            kind_for_restore(SlewSyncType::SyncToAltAz),
            SlewSyncType::SyncToAltAz
        );
    }

    #[tokio::test]
    async fn accepted_bad_sync_is_undone() {
        use std::sync::Arc;
        use std::time::Duration;

        use tokio_util::sync::CancellationToken;

        use crate::astronomy::condition_ra;
        use crate::config::Config;
        use crate::report::Outcome;
        use crate::simulator::{MountOptions, SimulatedTelescope};
        use crate::tester::ConformanceTester;

        let mut config = Config::default();
        config.general.poll_interval = Duration::from_millis(10);
        config.telescope.slew_minimum_wait = Duration::ZERO;
        config.simulator.slew_duration = Duration::from_millis(20);
        let options = MountOptions {
            accepts_invalid_syncs: true,
            ..Default::default()
        };
        let device = Arc::new(SimulatedTelescope::with_options(&config.simulator, options));
        let mut tester = TelescopeTester::new(device.clone(), &config, CancellationToken::new());
        assert!(tester.check_common().await);
        tester.pre_run_check().await;

        let lst = device.sidereal_time().await.unwrap();
        let ra = condition_ra(lst - 1.0);
        assert!(tester.slew_to("Setup", ra, 45.0).await);

        let kind = SlewSyncType::SyncToCoordinates;
        tester.check_slew_sync(kind).await;

        let accepted = tester
            .ctx
            .report
            .for_test("SyncToCoordinates Bad Coordinates")
            .filter(|e| e.outcome == Outcome::Issue && e.message.ends_with("was accepted"))
            .count();
        assert_eq!(accepted, 4);
        let ra_now = device.right_ascension().await.unwrap();
        let dec_now = device.declination().await.unwrap();
        assert!(
            ra_difference_arcsec(ra_now, ra) < 1.0,
            "RA {ra_now} vs {ra}"
        );
        assert!(dec_difference_arcsec(dec_now, 45.0) < 1.0, "Dec {dec_now}");
    }
}
