use super::TelescopeTester;
use crate::device::TelescopeDevice;
use crate::error::DeviceResult;
use crate::performance;

/// Members whose transaction rate is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceType {
    Altitude,
    AtHome,
    AtPark,
    Azimuth,
    Declination,
    IsPulseGuiding,
    RightAscension,
    SideOfPier,
    SiderealTime,
    Slewing,
    UtcDate,
}

impl PerformanceType {
    pub const ALL: [PerformanceType; 11] = [
        PerformanceType::Altitude,
        PerformanceType::AtHome,
        PerformanceType::AtPark,
        PerformanceType::Azimuth,
        PerformanceType::Declination,
        PerformanceType::IsPulseGuiding,
        PerformanceType::RightAscension,
        PerformanceType::SideOfPier,
        PerformanceType::SiderealTime,
        PerformanceType::Slewing,
        PerformanceType::UtcDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PerformanceType::Altitude => "Altitude",
            PerformanceType::AtHome => "AtHome",
            PerformanceType::AtPark => "AtPark",
            PerformanceType::Azimuth => "Azimuth",
            PerformanceType::Declination => "Declination",
            PerformanceType::IsPulseGuiding => "IsPulseGuiding",
            PerformanceType::RightAscension => "RightAscension",
            PerformanceType::SideOfPier => "SideOfPier",
            PerformanceType::SiderealTime => "SiderealTime",
            PerformanceType::Slewing => "Slewing",
            PerformanceType::UtcDate => "UTCDate",
        }
    }

    /// One read of the member, value discarded
    async fn call(self, device: &dyn TelescopeDevice) -> DeviceResult<()> {
        match self {
            PerformanceType::Altitude => device.altitude().await.map(drop),
            PerformanceType::AtHome => device.at_home().await.map(drop),
            PerformanceType::AtPark => device.at_park().await.map(drop),
            PerformanceType::Azimuth => device.azimuth().await.map(drop),
            PerformanceType::Declination => device.declination().await.map(drop),
            PerformanceType::IsPulseGuiding => device.is_pulse_guiding().await.map(drop),
            PerformanceType::RightAscension => device.right_ascension().await.map(drop),
            PerformanceType::SideOfPier => device.side_of_pier().await.map(drop),
            PerformanceType::SiderealTime => device.sidereal_time().await.map(drop),
            PerformanceType::Slewing => device.slewing().await.map(drop),
            PerformanceType::UtcDate => device.utc_date().await.map(drop),
        }
    }
}

impl TelescopeTester {
    pub(super) async fn measure_performance(&mut self, kind: PerformanceType) {
        if kind == PerformanceType::IsPulseGuiding && !self.caps.can_pulse_guide {
            self.ctx.debug(
                kind.name(),
                "Performance not measured because CanPulseGuide is False",
            );
            return;
        }
        let device = self.device.as_ref();
        performance::measure(&mut self.ctx, kind.name(), || kind.call(device)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_is_listed_once() {
        let mut names: Vec<_> = PerformanceType::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PerformanceType::ALL.len());
    }
}
