//! Device contracts exercised by the testers
//!
//! These traits mirror the ASCOM interface members one-to-one. Every member
//! returns a [`DeviceResult`] so the testers can classify the error a driver
//! produced, rather than just whether it failed.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DeviceError, DeviceResult};

/// Implements `TryFrom<i32>` and `Display` for an ASCOM integer enum
macro_rules! ascom_enum {
    ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl TryFrom<i32> for $name {
            type Error = DeviceError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(DeviceError::InvalidResponse(format!(
                        "{} is not a valid {} value",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                match value {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMode {
    AltAz,
    Polar,
    GermanPolar,
}

ascom_enum!(AlignmentMode { AltAz = 0, Polar = 1, GermanPolar = 2 });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquatorialSystem {
    Other,
    Topocentric,
    J2000,
    J2050,
    B1950,
}

ascom_enum!(EquatorialSystem {
    Other = 0,
    Topocentric = 1,
    J2000 = 2,
    J2050 = 3,
    B1950 = 4,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PierSide {
    East,
    West,
    Unknown,
}

ascom_enum!(PierSide { East = 0, West = 1, Unknown = -1 });

impl PierSide {
    pub fn opposite(self) -> PierSide {
        match self {
            PierSide::East => PierSide::West,
            PierSide::West => PierSide::East,
            PierSide::Unknown => PierSide::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideDirection {
    North,
    South,
    East,
    West,
}

ascom_enum!(GuideDirection { North = 0, South = 1, East = 2, West = 3 });

impl GuideDirection {
    pub const ALL: [GuideDirection; 4] = [
        GuideDirection::North,
        GuideDirection::South,
        GuideDirection::East,
        GuideDirection::West,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelescopeAxis {
    Primary,
    Secondary,
    Tertiary,
}

ascom_enum!(TelescopeAxis { Primary = 0, Secondary = 1, Tertiary = 2 });

impl TelescopeAxis {
    pub const ALL: [TelescopeAxis; 3] = [
        TelescopeAxis::Primary,
        TelescopeAxis::Secondary,
        TelescopeAxis::Tertiary,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveRate {
    Sidereal,
    Lunar,
    Solar,
    King,
}

ascom_enum!(DriveRate { Sidereal = 0, Lunar = 1, Solar = 2, King = 3 });

/// One entry of the AxisRates collection, in degrees per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRate {
    pub minimum: f64,
    pub maximum: f64,
}

/// Members common to every ASCOM device
#[async_trait]
pub trait Device: Send + Sync {
    async fn connected(&self) -> DeviceResult<bool>;
    async fn set_connected(&self, connected: bool) -> DeviceResult<()>;
    async fn description(&self) -> DeviceResult<String>;
    async fn driver_info(&self) -> DeviceResult<String>;
    async fn driver_version(&self) -> DeviceResult<String>;
    async fn interface_version(&self) -> DeviceResult<i32>;
    async fn name(&self) -> DeviceResult<String>;
    async fn supported_actions(&self) -> DeviceResult<Vec<String>>;
}

/// ASCOM FilterWheel members
#[async_trait]
pub trait FilterWheelDevice: Device {
    async fn focus_offsets(&self) -> DeviceResult<Vec<i32>>;
    async fn names(&self) -> DeviceResult<Vec<String>>;
    /// Current slot, -1 while the wheel is moving
    async fn position(&self) -> DeviceResult<i32>;
    async fn set_position(&self, position: i32) -> DeviceResult<()>;
}

/// ASCOM Telescope members (interface versions 1 to 4)
#[async_trait]
pub trait TelescopeDevice: Device {
    async fn alignment_mode(&self) -> DeviceResult<AlignmentMode>;
    async fn altitude(&self) -> DeviceResult<f64>;
    async fn aperture_area(&self) -> DeviceResult<f64>;
    async fn aperture_diameter(&self) -> DeviceResult<f64>;
    async fn at_home(&self) -> DeviceResult<bool>;
    async fn at_park(&self) -> DeviceResult<bool>;
    async fn azimuth(&self) -> DeviceResult<f64>;

    async fn can_find_home(&self) -> DeviceResult<bool>;
    async fn can_park(&self) -> DeviceResult<bool>;
    async fn can_pulse_guide(&self) -> DeviceResult<bool>;
    async fn can_set_declination_rate(&self) -> DeviceResult<bool>;
    async fn can_set_guide_rates(&self) -> DeviceResult<bool>;
    async fn can_set_park(&self) -> DeviceResult<bool>;
    async fn can_set_pier_side(&self) -> DeviceResult<bool>;
    async fn can_set_right_ascension_rate(&self) -> DeviceResult<bool>;
    async fn can_set_tracking(&self) -> DeviceResult<bool>;
    async fn can_slew(&self) -> DeviceResult<bool>;
    async fn can_slew_alt_az(&self) -> DeviceResult<bool>;
    async fn can_slew_alt_az_async(&self) -> DeviceResult<bool>;
    async fn can_slew_async(&self) -> DeviceResult<bool>;
    async fn can_sync(&self) -> DeviceResult<bool>;
    async fn can_sync_alt_az(&self) -> DeviceResult<bool>;
    async fn can_unpark(&self) -> DeviceResult<bool>;
    async fn can_move_axis(&self, axis: TelescopeAxis) -> DeviceResult<bool>;

    async fn declination(&self) -> DeviceResult<f64>;
    async fn declination_rate(&self) -> DeviceResult<f64>;
    async fn set_declination_rate(&self, rate: f64) -> DeviceResult<()>;
    async fn does_refraction(&self) -> DeviceResult<bool>;
    async fn set_does_refraction(&self, does_refraction: bool) -> DeviceResult<()>;
    async fn equatorial_system(&self) -> DeviceResult<EquatorialSystem>;
    async fn focal_length(&self) -> DeviceResult<f64>;
    async fn guide_rate_declination(&self) -> DeviceResult<f64>;
    async fn set_guide_rate_declination(&self, rate: f64) -> DeviceResult<()>;
    async fn guide_rate_right_ascension(&self) -> DeviceResult<f64>;
    async fn set_guide_rate_right_ascension(&self, rate: f64) -> DeviceResult<()>;
    async fn is_pulse_guiding(&self) -> DeviceResult<bool>;
    async fn right_ascension(&self) -> DeviceResult<f64>;
    async fn right_ascension_rate(&self) -> DeviceResult<f64>;
    async fn set_right_ascension_rate(&self, rate: f64) -> DeviceResult<()>;
    async fn side_of_pier(&self) -> DeviceResult<PierSide>;
    async fn set_side_of_pier(&self, side: PierSide) -> DeviceResult<()>;
    async fn sidereal_time(&self) -> DeviceResult<f64>;
    async fn site_elevation(&self) -> DeviceResult<f64>;
    async fn set_site_elevation(&self, elevation: f64) -> DeviceResult<()>;
    async fn site_latitude(&self) -> DeviceResult<f64>;
    async fn set_site_latitude(&self, latitude: f64) -> DeviceResult<()>;
    async fn site_longitude(&self) -> DeviceResult<f64>;
    async fn set_site_longitude(&self, longitude: f64) -> DeviceResult<()>;
    async fn slewing(&self) -> DeviceResult<bool>;
    async fn slew_settle_time(&self) -> DeviceResult<i32>;
    async fn set_slew_settle_time(&self, seconds: i32) -> DeviceResult<()>;
    async fn target_declination(&self) -> DeviceResult<f64>;
    async fn set_target_declination(&self, declination: f64) -> DeviceResult<()>;
    async fn target_right_ascension(&self) -> DeviceResult<f64>;
    async fn set_target_right_ascension(&self, right_ascension: f64) -> DeviceResult<()>;
    async fn tracking(&self) -> DeviceResult<bool>;
    async fn set_tracking(&self, tracking: bool) -> DeviceResult<()>;
    async fn tracking_rate(&self) -> DeviceResult<DriveRate>;
    async fn set_tracking_rate(&self, rate: DriveRate) -> DeviceResult<()>;
    async fn tracking_rates(&self) -> DeviceResult<Vec<DriveRate>>;
    async fn utc_date(&self) -> DeviceResult<DateTime<Utc>>;
    async fn set_utc_date(&self, date: DateTime<Utc>) -> DeviceResult<()>;

    async fn abort_slew(&self) -> DeviceResult<()>;
    async fn axis_rates(&self, axis: TelescopeAxis) -> DeviceResult<Vec<AxisRate>>;
    async fn destination_side_of_pier(&self, ra: f64, dec: f64) -> DeviceResult<PierSide>;
    async fn find_home(&self) -> DeviceResult<()>;
    async fn move_axis(&self, axis: TelescopeAxis, rate: f64) -> DeviceResult<()>;
    async fn park(&self) -> DeviceResult<()>;
    async fn pulse_guide(&self, direction: GuideDirection, duration_ms: i32) -> DeviceResult<()>;
    async fn set_park(&self) -> DeviceResult<()>;
    async fn slew_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()>;
    async fn slew_to_alt_az_async(&self, azimuth: f64, altitude: f64) -> DeviceResult<()>;
    async fn slew_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()>;
    async fn slew_to_coordinates_async(&self, ra: f64, dec: f64) -> DeviceResult<()>;
    async fn slew_to_target(&self) -> DeviceResult<()>;
    async fn slew_to_target_async(&self) -> DeviceResult<()>;
    async fn sync_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()>;
    async fn sync_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()>;
    async fn sync_to_target(&self) -> DeviceResult<()>;
    async fn unpark(&self) -> DeviceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_values_round_trip_through_i32() {
        for side in [PierSide::East, PierSide::West, PierSide::Unknown] {
            assert_eq!(PierSide::try_from(i32::from(side)).unwrap(), side);
        }
        assert_eq!(i32::from(PierSide::Unknown), -1);
        assert_eq!(i32::from(GuideDirection::West), 3);
    }

    #[test]
    fn out_of_range_enum_is_invalid_response() {
        let err = AlignmentMode::try_from(7).unwrap_err();
        assert_eq!(
            err,
            DeviceError::InvalidResponse("7 is not a valid AlignmentMode value".to_string())
        );
    }

    #[test]
    fn pier_side_opposite() {
        assert_eq!(PierSide::East.opposite(), PierSide::West);
        assert_eq!(PierSide::Unknown.opposite(), PierSide::Unknown);
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(DriveRate::Sidereal.to_string(), "Sidereal");
        assert_eq!(TelescopeAxis::Tertiary.to_string(), "Tertiary");
    }
}
