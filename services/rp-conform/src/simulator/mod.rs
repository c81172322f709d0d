//! In-process simulated devices
//!
//! Well-behaved implementations of the device traits, used by `--simulate`
//! and by the integration tests to exercise the testers end to end.

mod filter_wheel;
mod telescope;

pub use filter_wheel::SimulatedFilterWheel;
pub use telescope::{MountOptions, SimulatedTelescope};

use ascom_alpaca::ASCOMErrorCode;

use crate::classify::INVALID_WHILE_PARKED;
use crate::error::DeviceError;

fn ascom(code: ASCOMErrorCode, message: impl Into<String>) -> DeviceError {
    DeviceError::ascom(i32::from(code.raw()), message)
}

fn not_implemented(member: &str) -> DeviceError {
    ascom(
        ASCOMErrorCode::NOT_IMPLEMENTED,
        format!("{} is not implemented", member),
    )
}

fn not_connected() -> DeviceError {
    ascom(ASCOMErrorCode::NOT_CONNECTED, "Device is not connected")
}

fn invalid_value(message: impl Into<String>) -> DeviceError {
    ascom(ASCOMErrorCode::INVALID_VALUE, message)
}

fn value_not_set(member: &str) -> DeviceError {
    ascom(
        ASCOMErrorCode::VALUE_NOT_SET,
        format!("{} has not been set", member),
    )
}

fn invalid_operation(message: impl Into<String>) -> DeviceError {
    ascom(ASCOMErrorCode::INVALID_OPERATION, message)
}

fn parked(member: &str) -> DeviceError {
    DeviceError::ascom(
        INVALID_WHILE_PARKED,
        format!("{} is not allowed while parked", member),
    )
}
