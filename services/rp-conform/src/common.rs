//! Checks of the members every ASCOM device shares

use crate::classify::{ErrorCodeTable, MemberType, Required};
use crate::config::LegacyErrorCodes;
use crate::context::TestContext;
use crate::device::Device;

/// Identity details gathered while checking the common members
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentity {
    pub name: String,
    pub driver_info: String,
    pub interface_version: i32,
}

/// Connect the device. Returns false when testing cannot continue.
pub async fn connect<D: Device + ?Sized>(ctx: &mut TestContext, device: &D) -> bool {
    ctx.call_to_driver("Connected", "Connected = true");
    if let Err(err) = device.set_connected(true).await {
        ctx.issue(
            "Connected",
            format!("Unable to connect to the device: {}", err),
        );
        return false;
    }

    ctx.call_to_driver("Connected", "Connected");
    match device.connected().await {
        Ok(true) => {
            ctx.ok("Connected", "True");
            true
        }
        Ok(false) => {
            ctx.issue("Connected", "Connected is False after setting it True");
            false
        }
        Err(err) => {
            ctx.handle_exception(
                "Connected",
                MemberType::Property,
                Required::Mandatory,
                &err,
                "Connected",
            );
            false
        }
    }
}

/// Check Description, DriverInfo, DriverVersion, InterfaceVersion, Name and SupportedActions.
///
/// Also selects the legacy error code table matching the driver.
pub async fn check_common<D: Device + ?Sized>(
    ctx: &mut TestContext,
    device: &D,
    max_interface_version: i32,
    legacy: &[LegacyErrorCodes],
) -> DeviceIdentity {
    let mut identity = DeviceIdentity::default();

    ctx.call_to_driver("Description", "Description");
    match device.description().await {
        Ok(description) => check_text(ctx, "Description", &description, 68),
        Err(err) => ctx.handle_exception(
            "Description",
            MemberType::Property,
            Required::Mandatory,
            &err,
            "Description",
        ),
    }

    ctx.call_to_driver("DriverInfo", "DriverInfo");
    match device.driver_info().await {
        Ok(info) => {
            check_text(ctx, "DriverInfo", &info, usize::MAX);
            identity.driver_info = info;
        }
        Err(err) => ctx.handle_exception(
            "DriverInfo",
            MemberType::Property,
            Required::Mandatory,
            &err,
            "DriverInfo",
        ),
    }

    ctx.call_to_driver("DriverVersion", "DriverVersion");
    match device.driver_version().await {
        Ok(version) => check_text(ctx, "DriverVersion", &version, usize::MAX),
        Err(err) => ctx.handle_exception(
            "DriverVersion",
            MemberType::Property,
            Required::Mandatory,
            &err,
            "DriverVersion",
        ),
    }

    ctx.call_to_driver("InterfaceVersion", "InterfaceVersion");
    match device.interface_version().await {
        Ok(version) if (1..=max_interface_version).contains(&version) => {
            ctx.ok("InterfaceVersion", version.to_string());
            identity.interface_version = version;
        }
        Ok(version) => {
            ctx.issue(
                "InterfaceVersion",
                format!(
                    "InterfaceVersion {} is outside the valid range 1 to {}",
                    version, max_interface_version
                ),
            );
            identity.interface_version = version.clamp(1, max_interface_version);
        }
        Err(err) => {
            ctx.handle_exception(
                "InterfaceVersion",
                MemberType::Property,
                Required::Mandatory,
                &err,
                "InterfaceVersion",
            );
            identity.interface_version = 1;
        }
    }

    ctx.call_to_driver("Name", "Name");
    match device.name().await {
        Ok(name) => {
            check_text(ctx, "Name", &name, usize::MAX);
            identity.name = name;
        }
        Err(err) => ctx.handle_exception(
            "Name",
            MemberType::Property,
            Required::Mandatory,
            &err,
            "Name",
        ),
    }

    ctx.call_to_driver("SupportedActions", "SupportedActions");
    match device.supported_actions().await {
        Ok(actions) if actions.is_empty() => {
            ctx.ok("SupportedActions", "Driver returned an empty action list")
        }
        Ok(actions) => {
            for action in &actions {
                if action.trim().is_empty() {
                    ctx.issue("SupportedActions", "Supported action name is empty");
                } else {
                    ctx.ok("SupportedActions", format!("Found action: {}", action));
                }
            }
        }
        Err(err) => ctx.handle_exception(
            "SupportedActions",
            MemberType::Property,
            Required::Mandatory,
            &err,
            "SupportedActions",
        ),
    }

    let driver_identity = format!("{} {}", identity.name, identity.driver_info);
    ctx.errors = ErrorCodeTable::for_driver(&driver_identity, legacy);
    identity
}

/// Disconnect at the end of a run; a failure here is itself a conformance issue
pub async fn disconnect<D: Device + ?Sized>(ctx: &mut TestContext, device: &D) {
    ctx.call_to_driver("Disconnect", "Connected = false");
    match device.set_connected(false).await {
        Ok(()) => match device.connected().await {
            Ok(false) => ctx.ok("Disconnect", "Device disconnected"),
            Ok(true) => ctx.issue(
                "Disconnect",
                "Connected is still True after setting it False",
            ),
            Err(err) => ctx.debug(
                "Disconnect",
                format!("Connected could not be read after disconnecting: {}", err),
            ),
        },
        Err(err) => ctx.issue("Disconnect", format!("Error while disconnecting: {}", err)),
    }
}

fn check_text(ctx: &mut TestContext, test: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        ctx.info(test, "Returned an empty string");
    } else if value.chars().count() > max_len {
        ctx.issue(
            test,
            format!("Longer than {} characters: {}", max_len, value),
        );
    } else {
        ctx.ok(test, value);
    }
}
