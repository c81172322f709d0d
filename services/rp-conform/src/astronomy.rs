//! Astronomical reference values
//!
//! Sidereal time, equatorial/horizontal transforms and the angular
//! difference helpers used to judge whether a mount arrived where it was
//! sent. Positions are topocentric and ignore refraction.

use chrono::{DateTime, Utc};

use crate::error::{ConformError, Result};

/// Length of a sidereal second in SI seconds
pub const SIDEREAL_RATE: f64 = 0.99726956631945;

/// Sidereal tracking rate in arc-seconds per SI second
pub const SIDEREAL_ARCSEC_PER_SECOND: f64 = 15.0 / SIDEREAL_RATE;

/// Highest elevation considered for test targets, keeps clear of the zenith
pub const MAXIMUM_TEST_ELEVATION: f64 = 65.0;

const JULIAN_DATE_UNIX_EPOCH: f64 = 2_440_587.5;
const JULIAN_DATE_J2000: f64 = 2_451_545.0;

/// Wrap an hour value into [0, 24)
pub fn condition_ra(hours: f64) -> f64 {
    let wrapped = hours.rem_euclid(24.0);
    if wrapped >= 24.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an hour angle into (-12, 12]
pub fn condition_ha(hours: f64) -> f64 {
    let mut ha = condition_ra(hours);
    if ha > 12.0 {
        ha -= 24.0;
    }
    ha
}

/// Wrap an azimuth into [0, 360)
pub fn condition_azimuth(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Angular separation of two right ascensions in arc-seconds, taking the short way round
pub fn ra_difference_arcsec(ra1: f64, ra2: f64) -> f64 {
    let mut difference = (ra1 - ra2).abs().rem_euclid(24.0);
    if difference > 12.0 {
        difference = 24.0 - difference;
    }
    difference * 15.0 * 3600.0
}

/// Signed change in hours from `from` to `to`, in (-12, 12]
pub fn ra_change_hours(from: f64, to: f64) -> f64 {
    condition_ha(to - from)
}

pub fn dec_difference_arcsec(dec1: f64, dec2: f64) -> f64 {
    (dec1 - dec2).abs() * 3600.0
}

/// Azimuth separation in arc-seconds, taking the short way round
pub fn az_difference_arcsec(az1: f64, az2: f64) -> f64 {
    let mut difference = (az1 - az2).abs().rem_euclid(360.0);
    if difference > 180.0 {
        difference = 360.0 - difference;
    }
    difference * 3600.0
}

pub fn julian_date(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 86_400_000.0 + JULIAN_DATE_UNIX_EPOCH
}

/// Greenwich mean sidereal time in hours
pub fn greenwich_sidereal_time(time: DateTime<Utc>) -> f64 {
    let days = julian_date(time) - JULIAN_DATE_J2000;
    condition_ra(18.697_374_558 + 24.065_709_824_419_08 * days)
}

/// Local mean sidereal time in hours for a longitude in degrees (east positive)
pub fn local_sidereal_time(time: DateTime<Utc>, longitude: f64) -> f64 {
    condition_ra(greenwich_sidereal_time(time) + longitude / 15.0)
}

/// Altitude and azimuth in degrees of an equatorial position
pub fn radec_to_altaz(ra: f64, dec: f64, lst: f64, latitude: f64) -> (f64, f64) {
    let ha = ((lst - ra) * 15.0).to_radians();
    let dec = dec.to_radians();
    let lat = latitude.to_radians();

    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
    let alt = sin_alt.clamp(-1.0, 1.0).asin();
    let y = -dec.cos() * ha.sin();
    let x = dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos();
    let az = y.atan2(x);

    (alt.to_degrees(), condition_azimuth(az.to_degrees()))
}

/// Right ascension (hours) and declination (degrees) of a horizontal position
pub fn altaz_to_radec(alt: f64, az: f64, lst: f64, latitude: f64) -> (f64, f64) {
    let alt = alt.to_radians();
    let az = az.to_radians();
    let lat = latitude.to_radians();

    let sin_dec = alt.sin() * lat.sin() + alt.cos() * lat.cos() * az.cos();
    let dec = sin_dec.clamp(-1.0, 1.0).asin();
    let y = -az.sin() * alt.cos();
    let x = alt.sin() * lat.cos() - alt.cos() * lat.sin() * az.cos();
    let ha = y.atan2(x);

    (condition_ra(lst - ha.to_degrees() / 15.0), dec.to_degrees())
}

/// Elevation in degrees of an equatorial position
pub fn elevation(ra: f64, dec: f64, lst: f64, latitude: f64) -> f64 {
    radec_to_altaz(ra, dec, lst, latitude).0
}

/// Choose a declination for `ra` that keeps a test target well above the horizon.
///
/// Scans -85..=85 in 10 degree steps and returns the declination with the
/// highest elevation below [`MAXIMUM_TEST_ELEVATION`]. Fails with
/// [`ConformError::OperationInvalid`] when no candidate is above the horizon.
pub fn get_test_declination(ra: f64, lst: f64, latitude: f64) -> Result<f64> {
    let mut best: Option<(f64, f64)> = None;

    for step in 0..=17 {
        let dec = -85.0 + 10.0 * step as f64;
        let alt = elevation(ra, dec, lst, latitude);
        if alt >= MAXIMUM_TEST_ELEVATION {
            continue;
        }
        if best.is_none_or(|(_, best_alt)| alt > best_alt) {
            best = Some((dec, alt));
        }
    }

    match best {
        Some((dec, alt)) if alt >= 0.0 => {
            tracing::debug!(
                "Test declination for RA {}: {} (elevation {:.1})",
                format_hms(ra),
                format_dms(dec),
                alt
            );
            Ok(dec)
        }
        _ => Err(ConformError::OperationInvalid(format!(
            "no declination puts RA {} above the horizon",
            format_hms(ra)
        ))),
    }
}

/// Declination halfway between the site latitude and the pole of its hemisphere
pub fn pier_test_declination(latitude: f64) -> f64 {
    let pole = if latitude >= 0.0 { 90.0 } else { -90.0 };
    (latitude + pole) / 2.0
}

/// Format hours as HH:MM:SS.ss
pub fn format_hms(hours: f64) -> String {
    let hundredths = (condition_ra(hours) * 360_000.0).round() as i64;
    let h = (hundredths / 360_000) % 24;
    let m = (hundredths / 6_000) % 60;
    let s = (hundredths % 6_000) as f64 / 100.0;
    format!("{:02}:{:02}:{:05.2}", h, m, s)
}

/// Format degrees as sDD:MM:SS.s
pub fn format_dms(degrees: f64) -> String {
    let sign = if degrees < 0.0 { '-' } else { '+' };
    let tenths = (degrees.abs() * 36_000.0).round() as i64;
    let d = tenths / 36_000;
    let m = (tenths / 600) % 60;
    let s = (tenths % 600) as f64 / 10.0;
    format!("{}{:02}:{:02}:{:04.1}", sign, d, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ra_difference_wraps_around_zero() {
        let difference = ra_difference_arcsec(23.999, 0.001);
        assert!((difference - 108.0).abs() < 1e-6, "{difference}");
    }

    #[test]
    fn ra_difference_is_symmetric() {
        assert_eq!(
            ra_difference_arcsec(1.0, 5.0),
            ra_difference_arcsec(5.0, 1.0)
        );
        assert_eq!(ra_difference_arcsec(1.0, 5.0), 4.0 * 15.0 * 3600.0);
    }

    #[test]
    fn dec_difference_one_arcsecond() {
        let difference = dec_difference_arcsec(1.0, 1.00028);
        assert!((difference - 1.008).abs() < 1e-6, "{difference}");
    }

    #[test]
    fn az_difference_wraps_around_north() {
        assert!((az_difference_arcsec(359.5, 0.5) - 3600.0).abs() < 1e-6);
    }

    #[test]
    fn ra_change_is_signed_and_wrapped() {
        assert!((ra_change_hours(23.5, 0.5) - 1.0).abs() < 1e-9);
        assert!((ra_change_hours(0.5, 23.5) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn condition_ha_range() {
        assert_eq!(condition_ha(13.0), -11.0);
        assert_eq!(condition_ha(-3.0), -3.0);
        assert_eq!(condition_ha(12.0), 12.0);
    }

    #[test]
    fn gmst_at_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_date(j2000) - JULIAN_DATE_J2000).abs() < 1e-9);
        assert!((greenwich_sidereal_time(j2000) - 18.697_374_558).abs() < 1e-6);
    }

    #[test]
    fn lst_adds_longitude() {
        let time = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let gmst = greenwich_sidereal_time(time);
        assert!((local_sidereal_time(time, 15.0) - condition_ra(gmst + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn meridian_transit_altitude() {
        // On the meridian altitude is 90 - |lat - dec|
        let (alt, az) = radec_to_altaz(5.0, 20.0, 5.0, 50.0);
        assert!((alt - 60.0).abs() < 1e-9);
        assert!((az - 180.0).abs() < 1e-6);
    }

    #[test]
    fn altaz_round_trip() {
        let (alt, az) = radec_to_altaz(3.0, 35.0, 5.5, 51.0);
        let (ra, dec) = altaz_to_radec(alt, az, 5.5, 51.0);
        assert!(ra_difference_arcsec(ra, 3.0) < 0.01);
        assert!(dec_difference_arcsec(dec, 35.0) < 0.01);
    }

    #[test]
    fn test_declination_is_best_below_limit() {
        let lst = 10.0;
        let latitude = 51.0;
        let ra = 9.0;
        let dec = get_test_declination(ra, lst, latitude).unwrap();
        let chosen = elevation(ra, dec, lst, latitude);
        assert!(chosen < MAXIMUM_TEST_ELEVATION);

        for step in 0..=17 {
            let candidate = -85.0 + 10.0 * step as f64;
            let alt = elevation(ra, candidate, lst, latitude);
            if alt < MAXIMUM_TEST_ELEVATION {
                assert!(alt <= chosen, "dec {candidate} has {alt} > {chosen}");
            }
        }
    }

    #[test]
    fn test_declination_fails_when_nothing_clears_horizon() {
        // From the equator, anything 12h from the meridian is below the horizon
        let result = get_test_declination(0.0, 12.0, 0.0);
        match result {
            Err(ConformError::OperationInvalid(_)) => {}
            other => panic!("expected OperationInvalid, got {other:?}"),
        }
    }

    #[test]
    fn pier_test_declination_biases_to_pole() {
        assert_eq!(pier_test_declination(50.0), 70.0);
        assert_eq!(pier_test_declination(-30.0), -60.0);
    }

    #[test]
    fn formats_sexagesimal() {
        assert_eq!(format_hms(1.5), "01:30:00.00");
        assert_eq!(format_dms(-10.5), "-10:30:00.0");
        assert_eq!(format_dms(45.0), "+45:00:00.0");
    }
}
