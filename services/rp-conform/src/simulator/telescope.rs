//! Simulated German equatorial mount
//!
//! Positions are kept as RA/Dec and integrated forward on every access:
//! tracking holds RA fixed apart from any rate offsets, a stopped mount keeps
//! its hour angle fixed, and MoveAxis and pulse guides add their own motion.
//! Slews are instantaneous but keep `Slewing` true for the configured slew
//! duration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{
    invalid_operation, invalid_value, not_connected, not_implemented, parked, value_not_set,
};
use crate::astronomy::{
    altaz_to_radec, condition_ha, condition_ra, local_sidereal_time, radec_to_altaz,
    SIDEREAL_RATE,
};
use crate::config::SimulatorConfig;
use crate::device::{
    AlignmentMode, AxisRate, Device, DriveRate, EquatorialSystem, GuideDirection, PierSide,
    TelescopeAxis, TelescopeDevice,
};
use crate::error::DeviceResult;

/// Fastest MoveAxis rate in degrees per second
const MAX_AXIS_RATE: f64 = 4.0;

/// Default guide rate, half sidereal, in degrees per second
const DEFAULT_GUIDE_RATE: f64 = 0.5 * 15.0 / 3600.0;

const TRACKING_RATES: [DriveRate; 4] = [
    DriveRate::Sidereal,
    DriveRate::Lunar,
    DriveRate::Solar,
    DriveRate::King,
];

/// Capabilities the simulated mount advertises and honours, plus faults it
/// can be told to have
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountOptions {
    pub can_find_home: bool,
    pub can_park: bool,
    pub can_pulse_guide: bool,
    pub can_set_declination_rate: bool,
    pub can_set_guide_rates: bool,
    pub can_set_park: bool,
    pub can_set_pier_side: bool,
    pub can_set_right_ascension_rate: bool,
    pub can_set_tracking: bool,
    pub can_slew: bool,
    pub can_slew_alt_az: bool,
    pub can_slew_alt_az_async: bool,
    pub can_slew_async: bool,
    pub can_sync: bool,
    pub can_sync_alt_az: bool,
    pub can_unpark: bool,
    pub can_move_primary: bool,
    pub can_move_secondary: bool,
    pub can_move_tertiary: bool,
    /// Report which side of the pier the tube is on rather than the pointing state
    pub physical_pier_side: bool,
    /// Slewing stays False for this long after a slew starts, and the mount
    /// only arrives once the slew has run
    pub slewing_delay: Duration,
    /// Pulse guides move the opposite way to the requested direction
    pub reverse_guiding: bool,
    /// Fraction of each pulse guide that also moves the other axis
    pub guide_cross_axis_bleed: f64,
    /// Factor applied to RightAscensionRate and DeclinationRate motion
    pub rate_offset_scale: f64,
    /// SyncToCoordinates and SyncToAltAz take out of range coordinates
    pub accepts_invalid_syncs: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            can_find_home: true,
            can_park: true,
            can_pulse_guide: true,
            can_set_declination_rate: true,
            can_set_guide_rates: true,
            can_set_park: true,
            can_set_pier_side: true,
            can_set_right_ascension_rate: true,
            can_set_tracking: true,
            can_slew: true,
            can_slew_alt_az: true,
            can_slew_alt_az_async: true,
            can_slew_async: true,
            can_sync: true,
            can_sync_alt_az: true,
            can_unpark: true,
            can_move_primary: true,
            can_move_secondary: true,
            can_move_tertiary: false,
            physical_pier_side: false,
            slewing_delay: Duration::ZERO,
            reverse_guiding: false,
            guide_cross_axis_bleed: 0.0,
            rate_offset_scale: 1.0,
            accepts_invalid_syncs: false,
        }
    }
}

impl MountOptions {
    fn can_move(&self, axis: TelescopeAxis) -> bool {
        match axis {
            TelescopeAxis::Primary => self.can_move_primary,
            TelescopeAxis::Secondary => self.can_move_secondary,
            TelescopeAxis::Tertiary => self.can_move_tertiary,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pulse {
    direction: GuideDirection,
    start: Instant,
    end: Instant,
}

/// Destination of a slew whose motion has not started yet
#[derive(Debug, Clone, Copy)]
struct Arrival {
    ra: f64,
    dec: f64,
    at: Instant,
}

#[derive(Debug)]
struct MountState {
    connected: bool,
    ra: f64,
    dec: f64,
    updated: Instant,
    tracking: bool,
    tracking_rate: DriveRate,
    ra_rate: f64,
    dec_rate: f64,
    guide_rate_ra: f64,
    guide_rate_dec: f64,
    /// Primary and secondary MoveAxis rates in degrees per second
    axis_rates: [f64; 2],
    pulse: Option<Pulse>,
    slew_start: Instant,
    slew_end: Option<Instant>,
    arrival: Option<Arrival>,
    target_ra: Option<f64>,
    target_dec: Option<f64>,
    latitude: f64,
    longitude: f64,
    elevation: f64,
    slew_settle_time: i32,
    does_refraction: bool,
    at_park: bool,
    at_home: bool,
    /// Park position as (altitude, azimuth)
    park_position: (f64, f64),
    pier_override: Option<PierSide>,
    utc_offset: TimeDelta,
}

impl MountState {
    /// Integrate motion up to now
    fn advance(&mut self, options: &MountOptions) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.updated).as_secs_f64();

        let (ra_drift, dec_drift) = if self.tracking {
            let scale = options.rate_offset_scale;
            (
                scale * self.ra_rate * dt / (3600.0 * SIDEREAL_RATE),
                scale * self.dec_rate * dt / 3600.0,
            )
        } else {
            // Hour angle stays fixed, so RA follows sidereal time
            (dt / (3600.0 * SIDEREAL_RATE), 0.0)
        };
        self.ra += ra_drift;
        self.dec += dec_drift;

        if let Some(mut arrival) = self.arrival {
            arrival.ra += ra_drift;
            arrival.dec += dec_drift;
            if now >= arrival.at {
                self.ra = arrival.ra;
                self.dec = arrival.dec;
                self.arrival = None;
            } else {
                self.arrival = Some(arrival);
            }
        }

        self.ra += self.axis_rates[0] * dt / 15.0;
        self.dec += self.axis_rates[1] * dt;

        if let Some(pulse) = self.pulse {
            let from = self.updated.max(pulse.start);
            let to = now.min(pulse.end);
            if to > from {
                self.integrate_pulse(pulse.direction, (to - from).as_secs_f64(), options);
            }
            if now >= pulse.end {
                self.pulse = None;
            }
        }

        self.ra = condition_ra(self.ra);
        self.dec = self.dec.clamp(-90.0, 90.0);
        self.updated = now;
    }

    fn integrate_pulse(&mut self, direction: GuideDirection, seconds: f64, options: &MountOptions) {
        let sign = if options.reverse_guiding { -1.0 } else { 1.0 };
        // Degrees along the guided axis, positive towards North and East
        let (dec_move, ra_move) = match direction {
            GuideDirection::North => (self.guide_rate_dec * seconds, 0.0),
            GuideDirection::South => (-self.guide_rate_dec * seconds, 0.0),
            GuideDirection::East => (0.0, self.guide_rate_ra * seconds),
            GuideDirection::West => (0.0, -self.guide_rate_ra * seconds),
        };
        let bleed = options.guide_cross_axis_bleed;
        self.dec += sign * (dec_move + bleed * ra_move.abs());
        self.ra += sign * (ra_move + bleed * dec_move.abs()) / 15.0;
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now() + self.utc_offset
    }

    fn sidereal_time(&self) -> f64 {
        local_sidereal_time(self.utc_now(), self.longitude)
    }

    fn alt_az(&self) -> (f64, f64) {
        radec_to_altaz(self.ra, self.dec, self.sidereal_time(), self.latitude)
    }

    fn slewing(&self) -> bool {
        let now = Instant::now();
        self.slew_end
            .is_some_and(|end| now >= self.slew_start && now < end)
            || self.axis_rates.iter().any(|r| *r != 0.0)
    }

    fn pier_side_for(&self, ra: f64, physical: bool) -> PierSide {
        let ha = condition_ha(self.sidereal_time() - ra);
        let side = if ha >= 0.0 {
            PierSide::East
        } else {
            PierSide::West
        };
        if physical && ha.abs() > 6.0 {
            side.opposite()
        } else {
            side
        }
    }

    /// Start a slew to a new position, clearing any state tied to the old one.
    ///
    /// The mount jumps straight there unless `delay` holds the motion back, in
    /// which case it arrives when the slew ends.
    fn move_to(&mut self, ra: f64, dec: f64, delay: Duration, slew_duration: Duration) {
        let now = Instant::now();
        self.slew_start = now + delay;
        self.slew_end = Some(self.slew_start + slew_duration);
        if delay.is_zero() {
            self.ra = condition_ra(ra);
            self.dec = dec;
            self.updated = now;
            self.arrival = None;
        } else {
            self.arrival = Some(Arrival {
                ra,
                dec,
                at: self.slew_start + slew_duration,
            });
        }
        self.at_home = false;
        self.pier_override = None;
    }

    fn require_unparked(&self, member: &str) -> DeviceResult<()> {
        if self.at_park {
            Err(parked(member))
        } else {
            Ok(())
        }
    }
}

fn validate_equatorial(ra: f64, dec: f64) -> DeviceResult<()> {
    if !(0.0..24.0).contains(&ra) {
        return Err(invalid_value(format!(
            "RightAscension {} is outside 0 to 24",
            ra
        )));
    }
    if !(-90.0..=90.0).contains(&dec) {
        return Err(invalid_value(format!(
            "Declination {} is outside -90 to 90",
            dec
        )));
    }
    Ok(())
}

fn validate_horizontal(azimuth: f64, altitude: f64) -> DeviceResult<()> {
    if !(0.0..360.0).contains(&azimuth) {
        return Err(invalid_value(format!(
            "Azimuth {} is outside 0 to 360",
            azimuth
        )));
    }
    if !(-90.0..=90.0).contains(&altitude) {
        return Err(invalid_value(format!(
            "Altitude {} is outside -90 to 90",
            altitude
        )));
    }
    Ok(())
}

/// Simulated German equatorial mount
#[derive(Debug)]
pub struct SimulatedTelescope {
    options: MountOptions,
    slew_duration: Duration,
    state: Mutex<MountState>,
}

impl SimulatedTelescope {
    pub fn new(config: &SimulatorConfig) -> Self {
        let options = MountOptions {
            physical_pier_side: config.physical_pier_side,
            ..Default::default()
        };
        Self::with_options(config, options)
    }

    pub fn with_options(config: &SimulatorConfig, options: MountOptions) -> Self {
        let latitude = config.site_latitude;
        let park_position = if latitude >= 0.0 {
            (latitude, 0.0)
        } else {
            (-latitude, 180.0)
        };
        let lst = local_sidereal_time(Utc::now(), config.site_longitude);
        let (ra, dec) = altaz_to_radec(park_position.0, park_position.1, lst, latitude);

        Self {
            options,
            slew_duration: config.slew_duration,
            state: Mutex::new(MountState {
                connected: false,
                ra,
                dec,
                updated: Instant::now(),
                tracking: false,
                tracking_rate: DriveRate::Sidereal,
                ra_rate: 0.0,
                dec_rate: 0.0,
                guide_rate_ra: DEFAULT_GUIDE_RATE,
                guide_rate_dec: DEFAULT_GUIDE_RATE,
                axis_rates: [0.0; 2],
                pulse: None,
                slew_start: Instant::now(),
                slew_end: None,
                arrival: None,
                target_ra: None,
                target_dec: None,
                latitude,
                longitude: config.site_longitude,
                elevation: config.site_elevation,
                slew_settle_time: 0,
                does_refraction: false,
                at_park: true,
                at_home: false,
                park_position,
                pier_override: None,
                utc_offset: TimeDelta::zero(),
            }),
        }
    }

    /// Lock the state, failing when disconnected, with motion integrated to now
    async fn state(&self) -> DeviceResult<MutexGuard<'_, MountState>> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(not_connected());
        }
        state.advance(&self.options);
        Ok(state)
    }

    fn require(&self, capability: bool, member: &str) -> DeviceResult<()> {
        if capability {
            Ok(())
        } else {
            Err(not_implemented(member))
        }
    }

    /// Time from the start of a slew command until the mount has arrived
    fn slew_time(&self) -> Duration {
        self.options.slewing_delay + self.slew_duration
    }

    async fn slew_equatorial(
        &self,
        member: &str,
        ra: f64,
        dec: f64,
        wait: bool,
    ) -> DeviceResult<()> {
        {
            let mut state = self.state().await?;
            state.require_unparked(member)?;
            validate_equatorial(ra, dec)?;
            if !state.tracking {
                return Err(invalid_operation(format!(
                    "{} requires tracking to be enabled",
                    member
                )));
            }
            debug!("Simulated {} to RA {:.4} Dec {:.4}", member, ra, dec);
            state.move_to(ra, dec, self.options.slewing_delay, self.slew_duration);
            state.target_ra = Some(ra);
            state.target_dec = Some(dec);
        }
        if wait {
            tokio::time::sleep(self.slew_time()).await;
        }
        Ok(())
    }

    async fn slew_to_target_inner(&self, member: &str, wait: bool) -> DeviceResult<()> {
        let (ra, dec) = {
            let state = self.state().await?;
            match (state.target_ra, state.target_dec) {
                (Some(ra), Some(dec)) => (ra, dec),
                (None, _) => return Err(value_not_set("TargetRightAscension")),
                (_, None) => return Err(value_not_set("TargetDeclination")),
            }
        };
        self.slew_equatorial(member, ra, dec, wait)
            .await
    }

    async fn slew_horizontal(
        &self,
        member: &str,
        azimuth: f64,
        altitude: f64,
        wait: bool,
    ) -> DeviceResult<()> {
        {
            let mut state = self.state().await?;
            state.require_unparked(member)?;
            validate_horizontal(azimuth, altitude)?;
            if state.tracking {
                return Err(invalid_operation(format!(
                    "{} requires tracking to be disabled",
                    member
                )));
            }
            let (ra, dec) =
                altaz_to_radec(altitude, azimuth, state.sidereal_time(), state.latitude);
            debug!(
                "Simulated {} to Az {:.4} Alt {:.4}",
                member, azimuth, altitude
            );
            state.move_to(ra, dec, self.options.slewing_delay, self.slew_duration);
        }
        if wait {
            tokio::time::sleep(self.slew_time()).await;
        }
        Ok(())
    }

    async fn sync_equatorial(&self, member: &str, ra: f64, dec: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        state.require_unparked(member)?;
        if !self.options.accepts_invalid_syncs {
            validate_equatorial(ra, dec)?;
        }
        if !state.tracking {
            return Err(invalid_operation(format!(
                "{} requires tracking to be enabled",
                member
            )));
        }
        state.ra = ra;
        state.dec = dec;
        state.target_ra = Some(ra);
        state.target_dec = Some(dec);
        state.pier_override = None;
        Ok(())
    }
}

#[async_trait]
impl Device for SimulatedTelescope {
    async fn connected(&self) -> DeviceResult<bool> {
        Ok(self.state.lock().await.connected)
    }

    async fn set_connected(&self, connected: bool) -> DeviceResult<()> {
        debug!("Simulated telescope connected = {}", connected);
        let mut state = self.state.lock().await;
        state.advance(&self.options);
        state.connected = connected;
        Ok(())
    }

    async fn description(&self) -> DeviceResult<String> {
        Ok("Simulated German equatorial mount".to_string())
    }

    async fn driver_info(&self) -> DeviceResult<String> {
        Ok("rp-conform in-process telescope simulator".to_string())
    }

    async fn driver_version(&self) -> DeviceResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    async fn interface_version(&self) -> DeviceResult<i32> {
        Ok(4)
    }

    async fn name(&self) -> DeviceResult<String> {
        Ok("Simulated Telescope".to_string())
    }

    async fn supported_actions(&self) -> DeviceResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl TelescopeDevice for SimulatedTelescope {
    async fn alignment_mode(&self) -> DeviceResult<AlignmentMode> {
        self.state().await?;
        Ok(AlignmentMode::GermanPolar)
    }

    async fn altitude(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.alt_az().0)
    }

    async fn aperture_area(&self) -> DeviceResult<f64> {
        self.state().await?;
        Ok(0.0269)
    }

    async fn aperture_diameter(&self) -> DeviceResult<f64> {
        self.state().await?;
        Ok(0.2)
    }

    async fn at_home(&self) -> DeviceResult<bool> {
        Ok(self.state().await?.at_home)
    }

    async fn at_park(&self) -> DeviceResult<bool> {
        Ok(self.state().await?.at_park)
    }

    async fn azimuth(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.alt_az().1)
    }

    async fn can_find_home(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_find_home)
    }

    async fn can_park(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_park)
    }

    async fn can_pulse_guide(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_pulse_guide)
    }

    async fn can_set_declination_rate(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_declination_rate)
    }

    async fn can_set_guide_rates(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_guide_rates)
    }

    async fn can_set_park(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_park)
    }

    async fn can_set_pier_side(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_pier_side)
    }

    async fn can_set_right_ascension_rate(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_right_ascension_rate)
    }

    async fn can_set_tracking(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_set_tracking)
    }

    async fn can_slew(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_slew)
    }

    async fn can_slew_alt_az(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_slew_alt_az)
    }

    async fn can_slew_alt_az_async(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_slew_alt_az_async)
    }

    async fn can_slew_async(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_slew_async)
    }

    async fn can_sync(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_sync)
    }

    async fn can_sync_alt_az(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_sync_alt_az)
    }

    async fn can_unpark(&self) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_unpark)
    }

    async fn can_move_axis(&self, axis: TelescopeAxis) -> DeviceResult<bool> {
        self.state().await?;
        Ok(self.options.can_move(axis))
    }

    async fn declination(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.dec)
    }

    async fn declination_rate(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.dec_rate)
    }

    async fn set_declination_rate(&self, rate: f64) -> DeviceResult<()> {
        self.require(self.options.can_set_declination_rate, "DeclinationRate")?;
        self.state().await?.dec_rate = rate;
        Ok(())
    }

    async fn does_refraction(&self) -> DeviceResult<bool> {
        Ok(self.state().await?.does_refraction)
    }

    async fn set_does_refraction(&self, does_refraction: bool) -> DeviceResult<()> {
        self.state().await?.does_refraction = does_refraction;
        Ok(())
    }

    async fn equatorial_system(&self) -> DeviceResult<EquatorialSystem> {
        self.state().await?;
        Ok(EquatorialSystem::Topocentric)
    }

    async fn focal_length(&self) -> DeviceResult<f64> {
        self.state().await?;
        Ok(1.26)
    }

    async fn guide_rate_declination(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.guide_rate_dec)
    }

    async fn set_guide_rate_declination(&self, rate: f64) -> DeviceResult<()> {
        self.require(self.options.can_set_guide_rates, "GuideRateDeclination")?;
        if rate < 0.0 {
            return Err(invalid_value(format!("Guide rate {} is negative", rate)));
        }
        self.state().await?.guide_rate_dec = rate;
        Ok(())
    }

    async fn guide_rate_right_ascension(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.guide_rate_ra)
    }

    async fn set_guide_rate_right_ascension(&self, rate: f64) -> DeviceResult<()> {
        self.require(self.options.can_set_guide_rates, "GuideRateRightAscension")?;
        if rate < 0.0 {
            return Err(invalid_value(format!("Guide rate {} is negative", rate)));
        }
        self.state().await?.guide_rate_ra = rate;
        Ok(())
    }

    async fn is_pulse_guiding(&self) -> DeviceResult<bool> {
        self.require(self.options.can_pulse_guide, "IsPulseGuiding")?;
        let state = self.state().await?;
        let now = Instant::now();
        Ok(state.pulse.is_some_and(|pulse| now < pulse.end))
    }

    async fn right_ascension(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.ra)
    }

    async fn right_ascension_rate(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.ra_rate)
    }

    async fn set_right_ascension_rate(&self, rate: f64) -> DeviceResult<()> {
        self.require(
            self.options.can_set_right_ascension_rate,
            "RightAscensionRate",
        )?;
        self.state().await?.ra_rate = rate;
        Ok(())
    }

    async fn side_of_pier(&self) -> DeviceResult<PierSide> {
        let state = self.state().await?;
        Ok(state
            .pier_override
            .unwrap_or_else(|| state.pier_side_for(state.ra, self.options.physical_pier_side)))
    }

    async fn set_side_of_pier(&self, side: PierSide) -> DeviceResult<()> {
        self.require(self.options.can_set_pier_side, "SideOfPier")?;
        let mut state = self.state().await?;
        state.require_unparked("SideOfPier")?;
        if side == PierSide::Unknown {
            return Err(invalid_value("SideOfPier cannot be set to Unknown"));
        }
        let natural = state.pier_side_for(state.ra, self.options.physical_pier_side);
        state.pier_override = (side != natural).then_some(side);
        state.slew_start = Instant::now();
        state.slew_end = Some(state.slew_start + self.slew_duration);
        Ok(())
    }

    async fn sidereal_time(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.sidereal_time())
    }

    async fn site_elevation(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.elevation)
    }

    async fn set_site_elevation(&self, elevation: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !(-300.0..=10000.0).contains(&elevation) {
            return Err(invalid_value(format!(
                "SiteElevation {} is outside -300 to 10000",
                elevation
            )));
        }
        state.elevation = elevation;
        Ok(())
    }

    async fn site_latitude(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.latitude)
    }

    async fn set_site_latitude(&self, latitude: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid_value(format!(
                "SiteLatitude {} is outside -90 to 90",
                latitude
            )));
        }
        state.latitude = latitude;
        Ok(())
    }

    async fn site_longitude(&self) -> DeviceResult<f64> {
        Ok(self.state().await?.longitude)
    }

    async fn set_site_longitude(&self, longitude: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid_value(format!(
                "SiteLongitude {} is outside -180 to 180",
                longitude
            )));
        }
        state.longitude = longitude;
        Ok(())
    }

    async fn slewing(&self) -> DeviceResult<bool> {
        Ok(self.state().await?.slewing())
    }

    async fn slew_settle_time(&self) -> DeviceResult<i32> {
        Ok(self.state().await?.slew_settle_time)
    }

    async fn set_slew_settle_time(&self, seconds: i32) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if seconds < 0 {
            return Err(invalid_value(format!(
                "SlewSettleTime {} is negative",
                seconds
            )));
        }
        state.slew_settle_time = seconds;
        Ok(())
    }

    async fn target_declination(&self) -> DeviceResult<f64> {
        self.state()
            .await?
            .target_dec
            .ok_or_else(|| value_not_set("TargetDeclination"))
    }

    async fn set_target_declination(&self, declination: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !(-90.0..=90.0).contains(&declination) {
            return Err(invalid_value(format!(
                "TargetDeclination {} is outside -90 to 90",
                declination
            )));
        }
        state.target_dec = Some(declination);
        Ok(())
    }

    async fn target_right_ascension(&self) -> DeviceResult<f64> {
        self.state()
            .await?
            .target_ra
            .ok_or_else(|| value_not_set("TargetRightAscension"))
    }

    async fn set_target_right_ascension(&self, right_ascension: f64) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !(0.0..24.0).contains(&right_ascension) {
            return Err(invalid_value(format!(
                "TargetRightAscension {} is outside 0 to 24",
                right_ascension
            )));
        }
        state.target_ra = Some(right_ascension);
        Ok(())
    }

    async fn tracking(&self) -> DeviceResult<bool> {
        Ok(self.state().await?.tracking)
    }

    async fn set_tracking(&self, tracking: bool) -> DeviceResult<()> {
        self.require(self.options.can_set_tracking, "Tracking")?;
        let mut state = self.state().await?;
        if tracking {
            state.require_unparked("Tracking")?;
        }
        state.tracking = tracking;
        Ok(())
    }

    async fn tracking_rate(&self) -> DeviceResult<DriveRate> {
        Ok(self.state().await?.tracking_rate)
    }

    async fn set_tracking_rate(&self, rate: DriveRate) -> DeviceResult<()> {
        let mut state = self.state().await?;
        if !TRACKING_RATES.contains(&rate) {
            return Err(invalid_value(format!(
                "Tracking rate {} is not supported",
                rate
            )));
        }
        state.tracking_rate = rate;
        Ok(())
    }

    async fn tracking_rates(&self) -> DeviceResult<Vec<DriveRate>> {
        self.state().await?;
        Ok(TRACKING_RATES.to_vec())
    }

    async fn utc_date(&self) -> DeviceResult<DateTime<Utc>> {
        Ok(self.state().await?.utc_now())
    }

    async fn set_utc_date(&self, date: DateTime<Utc>) -> DeviceResult<()> {
        self.state().await?.utc_offset = date - Utc::now();
        Ok(())
    }

    async fn abort_slew(&self) -> DeviceResult<()> {
        let mut state = self.state().await?;
        state.require_unparked("AbortSlew")?;
        state.slew_end = None;
        state.arrival = None;
        state.axis_rates = [0.0; 2];
        Ok(())
    }

    async fn axis_rates(&self, axis: TelescopeAxis) -> DeviceResult<Vec<AxisRate>> {
        self.state().await?;
        if self.options.can_move(axis) {
            Ok(vec![AxisRate {
                minimum: 0.0,
                maximum: MAX_AXIS_RATE,
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn destination_side_of_pier(&self, ra: f64, dec: f64) -> DeviceResult<PierSide> {
        let state = self.state().await?;
        validate_equatorial(ra, dec)?;
        Ok(state.pier_side_for(ra, self.options.physical_pier_side))
    }

    async fn find_home(&self) -> DeviceResult<()> {
        self.require(self.options.can_find_home, "FindHome")?;
        let mut state = self.state().await?;
        state.require_unparked("FindHome")?;
        let (altitude, azimuth) = state.park_position;
        let (ra, dec) = altaz_to_radec(altitude, azimuth, state.sidereal_time(), state.latitude);
        state.move_to(ra, dec, Duration::ZERO, Duration::ZERO);
        state.at_home = true;
        Ok(())
    }

    async fn move_axis(&self, axis: TelescopeAxis, rate: f64) -> DeviceResult<()> {
        self.require(self.options.can_move(axis), "MoveAxis")?;
        let mut state = self.state().await?;
        state.require_unparked("MoveAxis")?;
        if rate.abs() > MAX_AXIS_RATE {
            return Err(invalid_value(format!(
                "Rate {} exceeds the maximum of {} degrees per second",
                rate, MAX_AXIS_RATE
            )));
        }
        match axis {
            TelescopeAxis::Primary => state.axis_rates[0] = rate,
            TelescopeAxis::Secondary => state.axis_rates[1] = rate,
            TelescopeAxis::Tertiary => {}
        }
        if rate != 0.0 {
            state.at_home = false;
            state.pier_override = None;
        }
        Ok(())
    }

    async fn park(&self) -> DeviceResult<()> {
        self.require(self.options.can_park, "Park")?;
        let mut state = self.state().await?;
        if state.at_park {
            return Ok(());
        }
        let (altitude, azimuth) = state.park_position;
        let (ra, dec) = altaz_to_radec(altitude, azimuth, state.sidereal_time(), state.latitude);
        state.move_to(ra, dec, Duration::ZERO, Duration::ZERO);
        state.tracking = false;
        state.axis_rates = [0.0; 2];
        state.pulse = None;
        state.at_park = true;
        debug!("Simulated telescope parked");
        Ok(())
    }

    async fn pulse_guide(&self, direction: GuideDirection, duration_ms: i32) -> DeviceResult<()> {
        self.require(self.options.can_pulse_guide, "PulseGuide")?;
        let mut state = self.state().await?;
        state.require_unparked("PulseGuide")?;
        let duration = u64::try_from(duration_ms)
            .map(Duration::from_millis)
            .map_err(|_| invalid_value(format!("Duration {} is negative", duration_ms)))?;
        let start = Instant::now();
        state.pulse = Some(Pulse {
            direction,
            start,
            end: start + duration,
        });
        state.at_home = false;
        Ok(())
    }

    async fn set_park(&self) -> DeviceResult<()> {
        self.require(self.options.can_set_park, "SetPark")?;
        let mut state = self.state().await?;
        state.park_position = state.alt_az();
        Ok(())
    }

    async fn slew_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.require(self.options.can_slew_alt_az, "SlewToAltAz")?;
        self.slew_horizontal("SlewToAltAz", azimuth, altitude, true)
            .await
    }

    async fn slew_to_alt_az_async(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.require(self.options.can_slew_alt_az_async, "SlewToAltAzAsync")?;
        self.slew_horizontal("SlewToAltAzAsync", azimuth, altitude, false)
            .await
    }

    async fn slew_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.require(self.options.can_slew, "SlewToCoordinates")?;
        self.slew_equatorial("SlewToCoordinates", ra, dec, true)
            .await
    }

    async fn slew_to_coordinates_async(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.require(self.options.can_slew_async, "SlewToCoordinatesAsync")?;
        self.slew_equatorial("SlewToCoordinatesAsync", ra, dec, false)
            .await
    }

    async fn slew_to_target(&self) -> DeviceResult<()> {
        self.require(self.options.can_slew, "SlewToTarget")?;
        self.slew_to_target_inner("SlewToTarget", true).await
    }

    async fn slew_to_target_async(&self) -> DeviceResult<()> {
        self.require(self.options.can_slew_async, "SlewToTargetAsync")?;
        self.slew_to_target_inner("SlewToTargetAsync", false).await
    }

    async fn sync_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.require(self.options.can_sync_alt_az, "SyncToAltAz")?;
        let mut state = self.state().await?;
        state.require_unparked("SyncToAltAz")?;
        if !self.options.accepts_invalid_syncs {
            validate_horizontal(azimuth, altitude)?;
        }
        if state.tracking {
            return Err(invalid_operation("SyncToAltAz requires tracking to be disabled"));
        }
        let (ra, dec) = altaz_to_radec(altitude, azimuth, state.sidereal_time(), state.latitude);
        state.ra = ra;
        state.dec = dec;
        state.pier_override = None;
        Ok(())
    }

    async fn sync_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.require(self.options.can_sync, "SyncToCoordinates")?;
        self.sync_equatorial("SyncToCoordinates", ra, dec).await
    }

    async fn sync_to_target(&self) -> DeviceResult<()> {
        self.require(self.options.can_sync, "SyncToTarget")?;
        let (ra, dec) = {
            let state = self.state().await?;
            match (state.target_ra, state.target_dec) {
                (Some(ra), Some(dec)) => (ra, dec),
                (None, _) => return Err(value_not_set("TargetRightAscension")),
                (_, None) => return Err(value_not_set("TargetDeclination")),
            }
        };
        self.sync_equatorial("SyncToTarget", ra, dec).await
    }

    async fn unpark(&self) -> DeviceResult<()> {
        self.require(self.options.can_unpark, "Unpark")?;
        let mut state = self.state().await?;
        state.at_park = false;
        debug!("Simulated telescope unparked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astronomy::{dec_difference_arcsec, ra_difference_arcsec};

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            slew_duration: Duration::from_millis(20),
            ..Default::default()
        }
    }

    async fn connected(options: MountOptions) -> SimulatedTelescope {
        let mount = SimulatedTelescope::with_options(&config(), options);
        mount.set_connected(true).await.unwrap();
        mount.unpark().await.unwrap();
        mount.set_tracking(true).await.unwrap();
        mount
    }

    #[tokio::test]
    async fn starts_parked_and_disconnected() {
        let mount = SimulatedTelescope::new(&config());
        assert_eq!(mount.at_park().await.unwrap_err().code(), Some(0x407));

        mount.set_connected(true).await.unwrap();
        assert!(mount.at_park().await.unwrap());
        let err = mount.slew_to_coordinates(1.0, 10.0).await.unwrap_err();
        assert_eq!(err.code(), Some(0x408));
    }

    #[tokio::test]
    async fn synchronous_slew_arrives_and_sets_target() {
        let mount = connected(MountOptions::default()).await;
        mount.slew_to_coordinates(5.5, 30.0).await.unwrap();

        assert!(!mount.slewing().await.unwrap());
        let ra = mount.right_ascension().await.unwrap();
        let dec = mount.declination().await.unwrap();
        assert!(ra_difference_arcsec(ra, 5.5) < 1.0);
        assert!(dec_difference_arcsec(dec, 30.0) < 1.0);
        assert_eq!(mount.target_right_ascension().await.unwrap(), 5.5);
    }

    #[tokio::test]
    async fn asynchronous_slew_reports_slewing() {
        let mount = connected(MountOptions::default()).await;
        mount.slew_to_coordinates_async(5.5, 30.0).await.unwrap();
        assert!(mount.slewing().await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!mount.slewing().await.unwrap());
    }

    #[tokio::test]
    async fn rejects_bad_coordinates() {
        let mount = connected(MountOptions::default()).await;
        let err = mount.slew_to_coordinates(24.0, 0.0).await.unwrap_err();
        assert_eq!(err.code(), Some(0x401));
        let err = mount.slew_to_coordinates(1.0, 91.0).await.unwrap_err();
        assert_eq!(err.code(), Some(0x401));
        let err = mount.set_target_declination(-91.0).await.unwrap_err();
        assert_eq!(err.code(), Some(0x401));
    }

    #[tokio::test]
    async fn target_reads_not_set_before_first_write() {
        let mount = connected(MountOptions::default()).await;
        let err = mount.target_declination().await.unwrap_err();
        assert_eq!(err.code(), Some(0x402));
    }

    #[tokio::test]
    async fn disabled_capability_is_not_implemented() {
        let options = MountOptions {
            can_find_home: false,
            ..Default::default()
        };
        let mount = connected(options).await;
        assert_eq!(mount.find_home().await.unwrap_err().code(), Some(0x400));
        assert!(!mount.can_find_home().await.unwrap());
    }

    #[tokio::test]
    async fn pulse_guide_moves_declination_by_guide_rate() {
        let mount = connected(MountOptions::default()).await;
        mount.slew_to_coordinates(3.0, 30.0).await.unwrap();
        let start = mount.declination().await.unwrap();

        mount.pulse_guide(GuideDirection::North, 100).await.unwrap();
        assert!(mount.is_pulse_guiding().await.unwrap());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!mount.is_pulse_guiding().await.unwrap());

        let moved = (mount.declination().await.unwrap() - start) * 3600.0;
        let expected = DEFAULT_GUIDE_RATE * 0.1 * 3600.0;
        assert!((moved - expected).abs() < 1e-6, "{moved} vs {expected}");
    }

    #[tokio::test]
    async fn pointing_state_follows_hour_angle() {
        let mount = connected(MountOptions::default()).await;
        let lst = mount.sidereal_time().await.unwrap();

        let west_of_meridian = condition_ra(lst - 3.0);
        let east_of_meridian = condition_ra(lst + 3.0);
        let west = mount.destination_side_of_pier(west_of_meridian, 60.0);
        assert_eq!(west.await.unwrap(), PierSide::East);
        let east = mount.destination_side_of_pier(east_of_meridian, 60.0);
        assert_eq!(east.await.unwrap(), PierSide::West);
    }

    #[tokio::test]
    async fn alt_az_slew_needs_tracking_off() {
        let mount = connected(MountOptions::default()).await;
        let err = mount.slew_to_alt_az(150.0, 50.0).await.unwrap_err();
        assert_eq!(err.code(), Some(0x40B));

        mount.set_tracking(false).await.unwrap();
        mount.slew_to_alt_az(150.0, 50.0).await.unwrap();
        let altitude = mount.altitude().await.unwrap();
        let azimuth = mount.azimuth().await.unwrap();
        assert!((altitude - 50.0).abs() < 1e-3, "{altitude}");
        assert!((azimuth - 150.0).abs() < 1e-3, "{azimuth}");
    }

    #[tokio::test]
    async fn delayed_slew_raises_slewing_late_and_arrives_at_the_end() {
        let config = SimulatorConfig {
            slew_duration: Duration::from_millis(100),
            ..Default::default()
        };
        let options = MountOptions {
            slewing_delay: Duration::from_millis(50),
            ..Default::default()
        };
        let mount = SimulatedTelescope::with_options(&config, options);
        mount.set_connected(true).await.unwrap();
        mount.unpark().await.unwrap();
        mount.set_tracking(true).await.unwrap();
        let start = mount.declination().await.unwrap();

        mount.slew_to_coordinates_async(5.5, 30.0).await.unwrap();
        assert!(!mount.slewing().await.unwrap());
        assert_eq!(mount.declination().await.unwrap(), start);

        tokio::time::sleep(Duration::from_millis(75)).await;
        assert!(mount.slewing().await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!mount.slewing().await.unwrap());
        let dec = mount.declination().await.unwrap();
        assert!(dec_difference_arcsec(dec, 30.0) < 1.0, "{dec}");
    }

    #[tokio::test]
    async fn reversed_guiding_moves_the_other_way() {
        let options = MountOptions {
            reverse_guiding: true,
            ..Default::default()
        };
        let mount = connected(options).await;
        mount.slew_to_coordinates(3.0, 30.0).await.unwrap();
        let start = mount.declination().await.unwrap();

        mount.pulse_guide(GuideDirection::North, 100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let moved = (mount.declination().await.unwrap() - start) * 3600.0;
        let expected = DEFAULT_GUIDE_RATE * 0.1 * 3600.0;
        assert!((moved + expected).abs() < 1e-6, "{moved} vs {expected}");
    }

    #[tokio::test]
    async fn guide_bleed_moves_the_cross_axis() {
        let options = MountOptions {
            guide_cross_axis_bleed: 0.5,
            ..Default::default()
        };
        let mount = connected(options).await;
        mount.slew_to_coordinates(3.0, 30.0).await.unwrap();
        let start = mount.right_ascension().await.unwrap();

        mount.pulse_guide(GuideDirection::North, 100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let moved = (mount.right_ascension().await.unwrap() - start) * 15.0 * 3600.0;
        let expected = 0.5 * DEFAULT_GUIDE_RATE * 0.1 * 3600.0;
        assert!((moved - expected).abs() < 1e-6, "{moved} vs {expected}");
    }
}
