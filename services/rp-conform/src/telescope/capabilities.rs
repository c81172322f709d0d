use std::future::Future;

use crate::classify::{MemberType, Required};
use crate::context::TestContext;
use crate::device::{TelescopeAxis, TelescopeDevice};
use crate::error::DeviceResult;

/// The `Can*` flags, read once after connecting and never changed afterwards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelescopeCapabilities {
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
    /// CanMoveAxis for the primary, secondary and tertiary axes
    pub can_move_axis: [bool; 3],
}

impl TelescopeCapabilities {
    pub fn can_move(&self, axis: TelescopeAxis) -> bool {
        self.can_move_axis[axis_index(axis)]
    }

    /// True when any form of slewing is supported
    pub fn can_slew_any(&self) -> bool {
        self.can_slew || self.can_slew_async || self.can_slew_alt_az || self.can_slew_alt_az_async
    }

    /// Read and report every capability flag.
    ///
    /// Flags introduced with interface version 2 are optional on older drivers;
    /// a flag that cannot be read counts as false.
    pub async fn read(
        ctx: &mut TestContext,
        device: &dyn TelescopeDevice,
        interface_version: i32,
    ) -> Self {
        let v1 = Required::Mandatory;
        let v2 = if interface_version >= 2 {
            Required::Mandatory
        } else {
            Required::Optional
        };

        let mut caps = Self {
            can_find_home: flag(ctx, "CanFindHome", v1, device.can_find_home()).await,
            can_park: flag(ctx, "CanPark", v1, device.can_park()).await,
            can_pulse_guide: flag(ctx, "CanPulseGuide", v1, device.can_pulse_guide()).await,
            can_set_declination_rate: flag(
                ctx,
                "CanSetDeclinationRate",
                v1,
                device.can_set_declination_rate(),
            )
            .await,
            can_set_guide_rates:
                flag(ctx, "CanSetGuideRates", v2, device.can_set_guide_rates()).await,
            can_set_park: flag(ctx, "CanSetPark", v1, device.can_set_park()).await,
            can_set_pier_side: flag(ctx, "CanSetPierSide", v2, device.can_set_pier_side()).await,
            can_set_right_ascension_rate: flag(
                ctx,
                "CanSetRightAscensionRate",
                v1,
                device.can_set_right_ascension_rate(),
            )
            .await,
            can_set_tracking: flag(ctx, "CanSetTracking", v1, device.can_set_tracking()).await,
            can_slew: flag(ctx, "CanSlew", v1, device.can_slew()).await,
            can_slew_alt_az: flag(ctx, "CanSlewAltAz", v2, device.can_slew_alt_az()).await,
            can_slew_alt_az_async:
                flag(ctx, "CanSlewAltAzAsync", v2, device.can_slew_alt_az_async()).await,
            can_slew_async: flag(ctx, "CanSlewAsync", v1, device.can_slew_async()).await,
            can_sync: flag(ctx, "CanSync", v1, device.can_sync()).await,
            can_sync_alt_az: flag(ctx, "CanSyncAltAz", v2, device.can_sync_alt_az()).await,
            can_unpark: flag(ctx, "CanUnpark", v1, device.can_unpark()).await,
            can_move_axis: [false; 3],
        };

        for axis in TelescopeAxis::ALL {
            ctx.call_to_driver("CanMoveAxis", &format!("CanMoveAxis({})", axis));
            match device.can_move_axis(axis).await {
                Ok(value) => {
                    ctx.ok("CanMoveAxis", format!("CanMoveAxis {}: {}", axis, value));
                    caps.can_move_axis[axis_index(axis)] = value;
                }
                Err(err) => ctx.handle_exception(
                    "CanMoveAxis",
                    MemberType::Method,
                    v2,
                    &err,
                    &format!("CanMoveAxis({})", axis),
                ),
            }
        }

        tracing::debug!("Telescope capabilities: {:?}", caps);
        caps
    }
}

fn axis_index(axis: TelescopeAxis) -> usize {
    match axis {
        TelescopeAxis::Primary => 0,
        TelescopeAxis::Secondary => 1,
        TelescopeAxis::Tertiary => 2,
    }
}

async fn flag(
    ctx: &mut TestContext,
    name: &str,
    required: Required,
    call: impl Future<Output = DeviceResult<bool>>,
) -> bool {
    ctx.call_to_driver(name, name);
    match call.await {
        Ok(value) => {
            ctx.ok(name, value.to_string());
            value
        }
        Err(err) => {
            ctx.handle_exception(name, MemberType::Property, required, &err, name);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_move_indexes_by_axis() {
        let caps = TelescopeCapabilities {
            can_move_axis: [true, false, true],
            ..Default::default()
        };
        assert!(caps.can_move(TelescopeAxis::Primary));
        assert!(!caps.can_move(TelescopeAxis::Secondary));
        assert!(caps.can_move(TelescopeAxis::Tertiary));
    }

    #[test]
    fn can_slew_any() {
        assert!(!TelescopeCapabilities::default().can_slew_any());
        let caps = TelescopeCapabilities {
            can_slew_alt_az_async: true,
            ..Default::default()
        };
        assert!(caps.can_slew_any());
    }
}
