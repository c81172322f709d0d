//! Telescope property checks

use chrono::Utc;

use super::{check_range, read, TelescopeTester};
use crate::astronomy::{condition_ha, format_dms, format_hms, local_sidereal_time};
use crate::classify::{MemberType, Required};
use crate::device::{AlignmentMode, TelescopeDevice};
use crate::error::DeviceResult;

/// Guide rate written when the current one cannot be read, half sidereal in degrees per second
const FALLBACK_GUIDE_RATE: f64 = 0.5 * 15.0 / 3600.0;

/// Writable floating point properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DoubleMember {
    DeclinationRate,
    RightAscensionRate,
    GuideRateDeclination,
    GuideRateRightAscension,
    SiteElevation,
    SiteLatitude,
    SiteLongitude,
    TargetDeclination,
    TargetRightAscension,
}

impl DoubleMember {
    pub(super) fn name(self) -> &'static str {
        match self {
            DoubleMember::DeclinationRate => "DeclinationRate",
            DoubleMember::RightAscensionRate => "RightAscensionRate",
            DoubleMember::GuideRateDeclination => "GuideRateDeclination",
            DoubleMember::GuideRateRightAscension => "GuideRateRightAscension",
            DoubleMember::SiteElevation => "SiteElevation",
            DoubleMember::SiteLatitude => "SiteLatitude",
            DoubleMember::SiteLongitude => "SiteLongitude",
            DoubleMember::TargetDeclination => "TargetDeclination",
            DoubleMember::TargetRightAscension => "TargetRightAscension",
        }
    }

    /// Largest read-back difference accepted after writing `value`
    fn tolerance(self, value: f64) -> f64 {
        match self {
            DoubleMember::DeclinationRate
            | DoubleMember::RightAscensionRate
            | DoubleMember::GuideRateDeclination
            | DoubleMember::GuideRateRightAscension => (value.abs() * 0.01).max(1e-6),
            DoubleMember::SiteElevation => 1.0,
            DoubleMember::SiteLatitude
            | DoubleMember::SiteLongitude
            | DoubleMember::TargetDeclination => 1.0 / 3600.0,
            // One tenth of a second of time
            DoubleMember::TargetRightAscension => 0.1 / 3600.0,
        }
    }

    pub(super) async fn read(self, device: &dyn TelescopeDevice) -> DeviceResult<f64> {
        match self {
            DoubleMember::DeclinationRate => device.declination_rate().await,
            DoubleMember::RightAscensionRate => device.right_ascension_rate().await,
            DoubleMember::GuideRateDeclination => device.guide_rate_declination().await,
            DoubleMember::GuideRateRightAscension => device.guide_rate_right_ascension().await,
            DoubleMember::SiteElevation => device.site_elevation().await,
            DoubleMember::SiteLatitude => device.site_latitude().await,
            DoubleMember::SiteLongitude => device.site_longitude().await,
            DoubleMember::TargetDeclination => device.target_declination().await,
            DoubleMember::TargetRightAscension => device.target_right_ascension().await,
        }
    }

    pub(super) async fn write(self, device: &dyn TelescopeDevice, value: f64) -> DeviceResult<()> {
        match self {
            DoubleMember::DeclinationRate => device.set_declination_rate(value).await,
            DoubleMember::RightAscensionRate => device.set_right_ascension_rate(value).await,
            DoubleMember::GuideRateDeclination => device.set_guide_rate_declination(value).await,
            DoubleMember::GuideRateRightAscension => {
                device.set_guide_rate_right_ascension(value).await
            }
            DoubleMember::SiteElevation => device.set_site_elevation(value).await,
            DoubleMember::SiteLatitude => device.set_site_latitude(value).await,
            DoubleMember::SiteLongitude => device.set_site_longitude(value).await,
            DoubleMember::TargetDeclination => device.set_target_declination(value).await,
            DoubleMember::TargetRightAscension => device.set_target_right_ascension(value).await,
        }
    }
}

impl TelescopeTester {
    pub(super) async fn check_telescope_properties(&mut self) {
        run_checks!(self;
            self.check_alignment_mode(),
            self.check_altitude(),
            self.check_aperture(),
            self.check_at_home_and_park(),
            self.check_azimuth(),
            self.check_declination(),
            self.check_rate(DoubleMember::DeclinationRate, &[1.0, -1.0, 0.0]),
            self.check_does_refraction(),
            self.check_equatorial_system(),
            self.check_focal_length(),
            self.check_guide_rate(DoubleMember::GuideRateDeclination),
            self.check_guide_rate(DoubleMember::GuideRateRightAscension),
            self.check_is_pulse_guiding(),
            self.check_right_ascension(),
            self.check_rate(DoubleMember::RightAscensionRate, &[0.1, -0.1, 0.0]),
            self.check_side_of_pier_read(),
            self.check_sidereal_time(),
            self.check_site(DoubleMember::SiteElevation, -300.0, 10000.0, [-301.0, 10001.0]),
            self.check_site(DoubleMember::SiteLatitude, -90.0, 90.0, [-91.0, 91.0]),
            self.check_site(DoubleMember::SiteLongitude, -180.0, 180.0, [-181.0, 181.0]),
            self.check_slewing(),
            self.check_slew_settle_time(),
            self.check_target(DoubleMember::TargetDeclination, [-91.0, 91.0], 45.0),
            self.check_target(DoubleMember::TargetRightAscension, [-1.0, 25.0], 12.0),
            self.check_tracking(),
            self.check_tracking_rates(),
            self.check_utc_date(),
        );
    }

    async fn check_alignment_mode(&mut self) {
        let mode = read(
            &mut self.ctx,
            "AlignmentMode",
            Required::Optional,
            self.device.alignment_mode(),
        )
        .await;
        if let Some(mode) = mode {
            self.ctx.ok("AlignmentMode", mode.to_string());
            self.alignment = Some(mode);
        }
    }

    async fn check_altitude(&mut self) {
        let altitude = read(
            &mut self.ctx,
            "Altitude",
            Required::Optional,
            self.device.altitude(),
        )
        .await;
        if let Some(altitude) = altitude {
            check_range(&mut self.ctx, "Altitude", altitude, 0.0, 90.0, true);
        }
    }

    async fn check_aperture(&mut self) {
        let area = read(
            &mut self.ctx,
            "ApertureArea",
            Required::Optional,
            self.device.aperture_area(),
        )
        .await;
        if let Some(area) = area {
            check_non_negative(&mut self.ctx, "ApertureArea", area);
        }
        let diameter = read(
            &mut self.ctx,
            "ApertureDiameter",
            Required::Optional,
            self.device.aperture_diameter(),
        )
        .await;
        if let Some(diameter) = diameter {
            check_non_negative(&mut self.ctx, "ApertureDiameter", diameter);
        }
    }

    async fn check_at_home_and_park(&mut self) {
        let required = self.required_from(2);
        let at_home = read(&mut self.ctx, "AtHome", required, self.device.at_home()).await;
        if let Some(at_home) = at_home {
            self.ctx.ok("AtHome", at_home.to_string());
        }
        let at_park = read(&mut self.ctx, "AtPark", required, self.device.at_park()).await;
        if let Some(at_park) = at_park {
            if at_park && !self.stuck_parked {
                self.ctx
                    .issue("AtPark", "AtPark is True after the mount was unparked");
            } else {
                self.ctx.ok("AtPark", at_park.to_string());
            }
        }
    }

    async fn check_azimuth(&mut self) {
        let azimuth = read(
            &mut self.ctx,
            "Azimuth",
            Required::Optional,
            self.device.azimuth(),
        )
        .await;
        if let Some(azimuth) = azimuth {
            check_range(&mut self.ctx, "Azimuth", azimuth, 0.0, 360.0, false);
        }
    }

    async fn check_declination(&mut self) {
        let dec = read(
            &mut self.ctx,
            "Declination",
            Required::Mandatory,
            self.device.declination(),
        )
        .await;
        if let Some(dec) = dec {
            if (-90.0..=90.0).contains(&dec) {
                self.ctx.ok("Declination", format_dms(dec));
            } else {
                check_range(&mut self.ctx, "Declination", dec, -90.0, 90.0, true);
            }
        }
    }

    async fn check_right_ascension(&mut self) {
        let ra = read(
            &mut self.ctx,
            "RightAscension",
            Required::Mandatory,
            self.device.right_ascension(),
        )
        .await;
        if let Some(ra) = ra {
            if (0.0..24.0).contains(&ra) {
                self.ctx.ok("RightAscension", format_hms(ra));
            } else {
                check_range(&mut self.ctx, "RightAscension", ra, 0.0, 24.0, false);
            }
        }
    }

    /// Read a rate offset, then write each of `values` and read it back.
    ///
    /// `values` ends with 0.0 so the mount is left tracking at the plain rate.
    async fn check_rate(&mut self, member: DoubleMember, values: &[f64]) {
        let name = member.name();
        let rate = read(
            &mut self.ctx,
            name,
            Required::Mandatory,
            member.read(self.device.as_ref()),
        )
        .await;
        if let Some(rate) = rate {
            self.ctx.ok(name, format!("{:.4}", rate));
        }

        let (capability, capability_name) = match member {
            DoubleMember::DeclinationRate => {
                (self.caps.can_set_declination_rate, "CanSetDeclinationRate")
            }
            _ => (
                self.caps.can_set_right_ascension_rate,
                "CanSetRightAscensionRate",
            ),
        };
        let test = format!("{} Write", name);
        if !capability {
            self.ctx.call_to_driver(&test, &format!("{} = 0.0", name));
            let result = member.write(self.device.as_ref(), 0.0).await;
            self.ctx
                .check_gated(&test, MemberType::Property, false, capability_name, result);
            return;
        }

        let required = Required::MustBeImplemented;
        let user_message = format!("{} is True", capability_name);
        for &value in values {
            self.round_trip(&test, member, value, required, &user_message)
                .await;
        }
    }

    async fn check_does_refraction(&mut self) {
        let test = "DoesRefraction Write";
        let Some(current) = read(
            &mut self.ctx,
            "DoesRefraction",
            Required::Optional,
            self.device.does_refraction(),
        )
        .await
        else {
            return;
        };
        self.ctx.ok("DoesRefraction", current.to_string());

        for value in [!current, current] {
            self.ctx
                .call_to_driver(test, &format!("DoesRefraction = {}", value));
            if let Err(err) = self.device.set_does_refraction(value).await {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::Optional,
                    &err,
                    &format!("Setting DoesRefraction to {}", value),
                );
                return;
            }
            self.ctx
                .ok(test, format!("Set DoesRefraction to {}", value));
        }
    }

    async fn check_equatorial_system(&mut self) {
        let required = self.required_from(2);
        let system = read(
            &mut self.ctx,
            "EquatorialSystem",
            required,
            self.device.equatorial_system(),
        )
        .await;
        if let Some(system) = system {
            self.ctx.ok("EquatorialSystem", system.to_string());
        }
    }

    async fn check_focal_length(&mut self) {
        let length = read(
            &mut self.ctx,
            "FocalLength",
            Required::Optional,
            self.device.focal_length(),
        )
        .await;
        if let Some(length) = length {
            check_non_negative(&mut self.ctx, "FocalLength", length);
        }
    }

    async fn check_guide_rate(&mut self, member: DoubleMember) {
        let name = member.name();
        let required = if self.caps.can_set_guide_rates {
            Required::MustBeImplemented
        } else {
            Required::Optional
        };
        let device = self.device.as_ref();
        let rate = read(&mut self.ctx, name, required, member.read(device)).await;
        if let Some(rate) = rate {
            check_non_negative(&mut self.ctx, name, rate);
        }

        let test = format!("{} Write", name);
        if !self.caps.can_set_guide_rates {
            let value = rate.unwrap_or(FALLBACK_GUIDE_RATE);
            self.ctx
                .call_to_driver(&test, &format!("{} = {}", name, value));
            let result = member.write(self.device.as_ref(), value).await;
            self.ctx.check_gated(
                &test,
                MemberType::Property,
                false,
                "CanSetGuideRates",
                result,
            );
            return;
        }

        match rate {
            Some(rate) => {
                self.round_trip(&test, member, rate, required, "CanSetGuideRates is True")
                    .await;
            }
            None => self
                .ctx
                .info(&test, "Skipped because the guide rate could not be read"),
        }
    }

    async fn check_is_pulse_guiding(&mut self) {
        self.ctx.call_to_driver("IsPulseGuiding", "IsPulseGuiding");
        let result = self.device.is_pulse_guiding().await;
        match self.ctx.check_gated(
            "IsPulseGuiding",
            MemberType::Property,
            self.caps.can_pulse_guide,
            "CanPulseGuide",
            result,
        ) {
            Some(false) => self.ctx.ok("IsPulseGuiding", "False"),
            Some(true) => self.ctx.issue(
                "IsPulseGuiding",
                "IsPulseGuiding is True when no pulse guide is in progress",
            ),
            None => {}
        }
    }

    async fn check_side_of_pier_read(&mut self) {
        let required = if self.caps.can_set_pier_side {
            Required::MustBeImplemented
        } else {
            Required::Optional
        };
        let side = read(
            &mut self.ctx,
            "SideOfPier",
            required,
            self.device.side_of_pier(),
        )
        .await;
        if let Some(side) = side {
            self.ctx.ok("SideOfPier", side.to_string());
        }
    }

    async fn check_sidereal_time(&mut self) {
        let test = "SiderealTime";
        let Some(sidereal_time) = read(
            &mut self.ctx,
            test,
            Required::Mandatory,
            self.device.sidereal_time(),
        )
        .await
        else {
            return;
        };
        if !check_range(&mut self.ctx, test, sidereal_time, 0.0, 24.0, false) {
            return;
        }

        let Some(longitude) = self.site.longitude else {
            self.ctx.info(
                test,
                "SiteLongitude is unavailable, not comparing with the computed value",
            );
            return;
        };
        let computed = local_sidereal_time(Utc::now(), longitude);
        let difference = condition_ha(sidereal_time - computed).abs();
        let message = format!(
            "Scope {} and computed {} sidereal times differ by {:.1} seconds",
            format_hms(sidereal_time),
            format_hms(computed),
            difference * 3600.0
        );
        if difference <= 1.0 / 60.0 {
            self.ctx.ok(test, message);
        } else if difference <= 1.0 {
            self.ctx.info(test, message);
        } else {
            self.ctx.issue(test, message);
        }
    }

    /// Range check the site value, try invalid writes, then write the original back
    async fn check_site(&mut self, member: DoubleMember, min: f64, max: f64, invalid: [f64; 2]) {
        let name = member.name();
        let required = Required::Optional;
        let device = self.device.as_ref();
        let value = read(&mut self.ctx, name, required, member.read(device)).await;
        if let Some(value) = value {
            check_range(&mut self.ctx, name, value, min, max, true);
        }

        let test = format!("{} Write", name);
        for bad in invalid {
            self.expect_rejected(&test, member, bad, required).await;
        }
        if let Some(value) = value {
            let message = format!("Writing {} back", name);
            self.round_trip(&test, member, value, required, &message)
                .await;
        }
    }

    async fn check_slewing(&mut self) {
        let required = if self.caps.can_slew_any() {
            Required::MustBeImplemented
        } else {
            Required::Optional
        };
        match read(&mut self.ctx, "Slewing", required, self.device.slewing()).await {
            Some(false) => self.ctx.ok("Slewing", "False"),
            Some(true) => self
                .ctx
                .issue("Slewing", "Slewing is True when no slew has been requested"),
            None => {}
        }
    }

    async fn check_slew_settle_time(&mut self) {
        let test = "SlewSettleTime Write";
        let settle = read(
            &mut self.ctx,
            "SlewSettleTime",
            Required::Optional,
            self.device.slew_settle_time(),
        )
        .await;
        if let Some(settle) = settle {
            if settle < 0 {
                self.ctx.issue(
                    "SlewSettleTime",
                    format!("Negative settle time: {}", settle),
                );
            } else {
                self.ctx.ok("SlewSettleTime", format!("{} seconds", settle));
            }
        }

        self.ctx.call_to_driver(test, "SlewSettleTime = -1");
        match self.device.set_slew_settle_time(-1).await {
            Ok(()) => self
                .ctx
                .issue(test, "Invalid value -1 was accepted without an error"),
            Err(err) => self.ctx.handle_invalid_value_exception_as_ok(
                test,
                MemberType::Property,
                Required::Optional,
                &err,
                "Setting SlewSettleTime to -1",
                "Invalid value -1 rejected",
            ),
        }

        if let Some(settle) = settle.filter(|s| *s >= 0) {
            self.ctx
                .call_to_driver(test, &format!("SlewSettleTime = {}", settle));
            match self.device.set_slew_settle_time(settle).await {
                Ok(()) => self
                    .ctx
                    .ok(test, format!("Legal value {} written successfully", settle)),
                Err(err) => self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::Optional,
                    &err,
                    "Writing SlewSettleTime back",
                ),
            }
        }
    }

    /// First use, invalid values and a valid round trip of a target property
    async fn check_target(&mut self, member: DoubleMember, invalid: [f64; 2], valid: f64) {
        let name = member.name();
        let required = if self.caps.can_slew || self.caps.can_slew_async || self.caps.can_sync {
            Required::MustBeImplemented
        } else {
            Required::Optional
        };

        let read_test = format!("{} Read", name);
        if self.settings.first_use_tests {
            self.ctx.call_to_driver(&read_test, name);
            match member.read(self.device.as_ref()).await {
                Ok(value) => self.ctx.issue(
                    &read_test,
                    format!(
                        "Read before write should return a value not set error but returned {}",
                        value
                    ),
                ),
                Err(err) if self.ctx.errors.is_not_set(&err) => self.ctx.ok(
                    &read_test,
                    "Read before write returned the expected value not set error",
                ),
                Err(err) => self.ctx.handle_exception(
                    &read_test,
                    MemberType::Property,
                    required,
                    &err,
                    "Reading before the first write",
                ),
            }
        } else {
            self.ctx
                .debug(&read_test, "First use test skipped by configuration");
        }

        let write_test = format!("{} Write", name);
        for bad in invalid {
            self.expect_rejected(&write_test, member, bad, required)
                .await;
        }
        let message = format!("Setting {}", name);
        self.round_trip(&write_test, member, valid, required, &message)
            .await;
    }

    async fn check_tracking(&mut self) {
        let Some(tracking) = read(
            &mut self.ctx,
            "Tracking",
            Required::Mandatory,
            self.device.tracking(),
        )
        .await
        else {
            return;
        };
        self.ctx.ok("Tracking", tracking.to_string());

        let test = "Tracking Write";
        if !self.caps.can_set_tracking {
            self.ctx
                .call_to_driver(test, &format!("Tracking = {}", tracking));
            let result = self.device.set_tracking(tracking).await;
            self.ctx
                .check_gated(test, MemberType::Property, false, "CanSetTracking", result);
            return;
        }
        if !self.should_run("Tracking", true) {
            return;
        }

        for value in [!tracking, tracking] {
            self.ctx
                .call_to_driver(test, &format!("Tracking = {}", value));
            if let Err(err) = self.device.set_tracking(value).await {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::MustBeImplemented,
                    &err,
                    "CanSetTracking is True",
                );
                return;
            }
            match self.device.tracking().await {
                Ok(read_back) if read_back == value => {
                    self.ctx.ok(test, format!("Tracking set to {}", value))
                }
                Ok(read_back) => self.ctx.issue(
                    test,
                    format!(
                        "Tracking was set to {} but reads back as {}",
                        value, read_back
                    ),
                ),
                Err(err) => self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    Required::Mandatory,
                    &err,
                    "Tracking",
                ),
            }
        }
    }

    async fn check_tracking_rates(&mut self) {
        let required = self.required_from(2);
        let rates = read(
            &mut self.ctx,
            "TrackingRates",
            required,
            self.device.tracking_rates(),
        )
        .await;
        if let Some(rates) = &rates {
            if rates.is_empty() {
                self.ctx
                    .issue("TrackingRates", "No tracking rates returned");
            } else {
                self.ctx.ok(
                    "TrackingRates",
                    format!("Found {} tracking rates", rates.len()),
                );
                for rate in rates {
                    self.ctx
                        .info("TrackingRates", format!("Found drive rate: {}", rate));
                }
            }
        }

        let current = read(
            &mut self.ctx,
            "TrackingRate",
            required,
            self.device.tracking_rate(),
        )
        .await;
        if let Some(current) = current {
            self.ctx.ok("TrackingRate", current.to_string());
        }

        let (Some(rates), Some(current)) = (rates, current) else {
            return;
        };
        let test = "TrackingRate Write";
        for rate in rates.into_iter().chain(std::iter::once(current)) {
            self.ctx
                .call_to_driver(test, &format!("TrackingRate = {}", rate));
            if let Err(err) = self.device.set_tracking_rate(rate).await {
                self.ctx.handle_exception(
                    test,
                    MemberType::Property,
                    required,
                    &err,
                    &format!("Setting TrackingRate to {}", rate),
                );
                continue;
            }
            match self.device.tracking_rate().await {
                Ok(read_back) if read_back == rate => self
                    .ctx
                    .ok(test, format!("Successfully set drive rate: {}", rate)),
                Ok(read_back) => self.ctx.issue(
                    test,
                    format!(
                        "TrackingRate was set to {} but reads back as {}",
                        rate, read_back
                    ),
                ),
                Err(err) => self
                    .ctx
                    .handle_exception(test, MemberType::Property, required, &err, "TrackingRate"),
            }
        }
    }

    async fn check_utc_date(&mut self) {
        let Some(date) = read(
            &mut self.ctx,
            "UTCDate",
            Required::Optional,
            self.device.utc_date(),
        )
        .await
        else {
            return;
        };
        let offset = date - Utc::now();
        self.ctx.ok("UTCDate", date.to_rfc3339());
        if offset.num_seconds().abs() > 3600 {
            self.ctx.info(
                "UTCDate",
                format!(
                    "UTCDate differs from the local clock by {} seconds",
                    offset.num_seconds()
                ),
            );
        }

        let test = "UTCDate Write";
        self.ctx.call_to_driver(test, "UTCDate = current value");
        match self.device.set_utc_date(Utc::now() + offset).await {
            Ok(()) => self.ctx.ok(test, "New UTCDate written successfully"),
            Err(err) => self.ctx.handle_exception(
                test,
                MemberType::Property,
                Required::Optional,
                &err,
                "Writing UTCDate back",
            ),
        }
    }

    /// Write `value` and read it back, recording OK when it round-trips
    pub(super) async fn round_trip(
        &mut self,
        test: &str,
        member: DoubleMember,
        value: f64,
        required: Required,
        user_message: &str,
    ) -> bool {
        let name = member.name();
        self.ctx
            .call_to_driver(test, &format!("{} = {}", name, value));
        if let Err(err) = member.write(self.device.as_ref(), value).await {
            self.ctx
                .handle_exception(test, MemberType::Property, required, &err, user_message);
            return false;
        }

        match member.read(self.device.as_ref()).await {
            Ok(read_back) if (read_back - value).abs() <= member.tolerance(value) => {
                self.ctx
                    .ok(test, format!("Legal value {} written successfully", value));
                true
            }
            Ok(read_back) => {
                self.ctx.issue(
                    test,
                    format!(
                        "{} was set to {} but reads back as {}",
                        name, value, read_back
                    ),
                );
                false
            }
            Err(err) => {
                self.ctx
                    .handle_exception(test, MemberType::Property, required, &err, name);
                false
            }
        }
    }

    /// Write an out of range value that must be rejected with InvalidValue
    async fn expect_rejected(
        &mut self,
        test: &str,
        member: DoubleMember,
        value: f64,
        required: Required,
    ) {
        let name = member.name();
        self.ctx
            .call_to_driver(test, &format!("{} = {}", name, value));
        match member.write(self.device.as_ref(), value).await {
            Ok(()) => self.ctx.issue(
                test,
                format!("Invalid value {} was accepted without an error", value),
            ),
            Err(err) => self.ctx.handle_invalid_value_exception_as_ok(
                test,
                MemberType::Property,
                required,
                &err,
                &format!("Setting {} to {}", name, value),
                &format!("Invalid value {} rejected", value),
            ),
        }
    }

    pub(super) fn is_german_mount(&self) -> bool {
        self.alignment == Some(AlignmentMode::GermanPolar)
    }
}

fn check_non_negative(ctx: &mut crate::context::TestContext, test: &str, value: f64) {
    if value < 0.0 {
        ctx.issue(test, format!("Negative value returned: {}", value));
    } else {
        ctx.ok(test, format!("{}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_tolerance_is_relative_with_a_floor() {
        assert_eq!(DoubleMember::DeclinationRate.tolerance(0.0), 1e-6);
        assert!((DoubleMember::RightAscensionRate.tolerance(-0.1) - 0.001).abs() < 1e-12);
        assert_eq!(DoubleMember::SiteElevation.tolerance(80.0), 1.0);
    }

    #[test]
    fn target_right_ascension_tolerance_is_a_tenth_of_a_second() {
        let tolerance = DoubleMember::TargetRightAscension.tolerance(12.0);
        assert!((tolerance * 3600.0 - 0.1).abs() < 1e-9);
    }
}
