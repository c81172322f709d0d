//! Device error classification
//!
//! Maps the raw error numbers a driver returns onto the handful of semantic
//! kinds the testers care about. Standard Alpaca numbers, their COM HRESULT
//! equivalents and per-driver legacy numbers from the configuration all
//! normalise to the same [`ErrorKind`].

use ascom_alpaca::ASCOMErrorCode;

use crate::config::LegacyErrorCodes;
use crate::error::DeviceError;

/// Raw numbers not exported by the alpaca crate
pub(crate) const INVALID_WHILE_PARKED: i32 = 0x408;
const INVALID_WHILE_SLAVED: i32 = 0x409;
const ACTION_NOT_IMPLEMENTED: i32 = 0x40C;

/// Facility prefix of COM HRESULTs that wrap ASCOM error numbers
const COM_ASCOM_FACILITY: u32 = 0x8004_0000;

/// Semantic category of a device error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotImplemented,
    InvalidValue,
    ValueNotSet,
    InvalidOperation,
    InvalidWhileParked,
    InvalidWhileSlaved,
    NotConnected,
    Other,
}

/// How strictly a member must be implemented in the current context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Required {
    /// Must work regardless of capabilities
    Mandatory,
    /// May be absent
    Optional,
    /// A capability says it works
    MustBeImplemented,
    /// A capability says it does not work
    MustNotBeImplemented,
}

/// Whether the member under test is a property or a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Property,
    Method,
}

impl MemberType {
    fn noun(&self) -> &'static str {
        match self {
            MemberType::Property => "property",
            MemberType::Method => "method",
        }
    }
}

/// Lookup table from raw error numbers to [`ErrorKind`]
#[derive(Debug, Clone, Default)]
pub struct ErrorCodeTable {
    legacy: LegacyErrorCodes,
}

impl ErrorCodeTable {
    /// Standard codes only
    pub fn standard() -> Self {
        Self::default()
    }

    /// Pick the legacy entry whose `driver` key matches the device identity
    pub fn for_driver(identity: &str, legacy: &[LegacyErrorCodes]) -> Self {
        let identity = identity.to_lowercase();
        let matched = legacy
            .iter()
            .find(|entry| {
                !entry.driver.is_empty() && identity.contains(&entry.driver.to_lowercase())
            });
        match matched {
            Some(entry) => {
                tracing::debug!("Using legacy error codes for driver '{}'", entry.driver);
                Self {
                    legacy: entry.clone(),
                }
            }
            None => Self::standard(),
        }
    }

    pub fn kind(&self, err: &DeviceError) -> ErrorKind {
        match err.code() {
            Some(code) => self.kind_of_code(code),
            None => ErrorKind::Other,
        }
    }

    pub fn kind_of_code(&self, code: i32) -> ErrorKind {
        if self.legacy.not_implemented.contains(&code) {
            return ErrorKind::NotImplemented;
        }
        if self.legacy.invalid_value.contains(&code) {
            return ErrorKind::InvalidValue;
        }
        if self.legacy.value_not_set.contains(&code) {
            return ErrorKind::ValueNotSet;
        }
        if self.legacy.invalid_operation.contains(&code) {
            return ErrorKind::InvalidOperation;
        }
        standard_kind(strip_com_facility(code))
    }

    /// True for any of the shapes drivers use to say "this value has not been set yet".
    ///
    /// VALUE_NOT_SET, INVALID_OPERATION and the driver's legacy not-set
    /// numbers are one signal.
    pub fn is_not_set(&self, err: &DeviceError) -> bool {
        matches!(
            self.kind(err),
            ErrorKind::ValueNotSet | ErrorKind::InvalidOperation
        )
    }

    pub fn is_not_implemented(&self, err: &DeviceError) -> bool {
        self.kind(err) == ErrorKind::NotImplemented
    }

    pub fn is_invalid_value(&self, err: &DeviceError) -> bool {
        self.kind(err) == ErrorKind::InvalidValue
    }
}

fn strip_com_facility(code: i32) -> i32 {
    let raw = code as u32;
    if raw & 0xFFFF_0000 == COM_ASCOM_FACILITY {
        (raw & 0xFFFF) as i32
    } else {
        code
    }
}

fn standard_kind(code: i32) -> ErrorKind {
    let is = |standard: ASCOMErrorCode| code == i32::from(standard.raw());

    if is(ASCOMErrorCode::NOT_IMPLEMENTED) || code == ACTION_NOT_IMPLEMENTED {
        ErrorKind::NotImplemented
    } else if is(ASCOMErrorCode::INVALID_VALUE) {
        ErrorKind::InvalidValue
    } else if is(ASCOMErrorCode::VALUE_NOT_SET) {
        ErrorKind::ValueNotSet
    } else if is(ASCOMErrorCode::NOT_CONNECTED) {
        ErrorKind::NotConnected
    } else if is(ASCOMErrorCode::INVALID_OPERATION) {
        ErrorKind::InvalidOperation
    } else if code == INVALID_WHILE_PARKED {
        ErrorKind::InvalidWhileParked
    } else if code == INVALID_WHILE_SLAVED {
        ErrorKind::InvalidWhileSlaved
    } else {
        ErrorKind::Other
    }
}

const MUST_FUNCTION: &str = "must function per the ASCOM specification";

/// Outcome and message for an error raised by a member call
pub fn classify_error(
    table: &ErrorCodeTable,
    member_type: MemberType,
    required: Required,
    err: &DeviceError,
    user_message: &str,
) -> (crate::report::Outcome, String) {
    use crate::report::Outcome;

    let noun = member_type.noun();
    match table.kind(err) {
        ErrorKind::NotImplemented => match required {
            Required::Mandatory => (
                Outcome::Issue,
                format!(
                    "This {} is mandatory but returned a NotImplemented error, it {}",
                    noun, MUST_FUNCTION
                ),
            ),
            Required::MustNotBeImplemented => (
                Outcome::Ok,
                format!(
                    "{} and a NotImplemented error was generated as expected",
                    user_message
                ),
            ),
            Required::MustBeImplemented => (
                Outcome::Issue,
                format!(
                    "{} and a NotImplemented error was returned, this {} {}",
                    user_message, noun, MUST_FUNCTION
                ),
            ),
            Required::Optional => (
                Outcome::Ok,
                format!("Optional {} returned a NotImplemented error", noun),
            ),
        },
        ErrorKind::InvalidOperation => (
            Outcome::Issue,
            format!(
                "{}: unexpected InvalidOperation error: {}",
                user_message, err
            ),
        ),
        _ => match required {
            Required::MustNotBeImplemented => (
                Outcome::Issue,
                format!(
                    "{} but the {} returned an error other than NotImplemented: {}",
                    user_message, noun, err
                ),
            ),
            _ => (
                Outcome::Issue,
                format!("{}: unexpected error: {}", user_message, err),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;

    fn err(code: i32) -> DeviceError {
        DeviceError::ascom(code, "test")
    }

    #[test]
    fn standard_codes_map_to_kinds() {
        let table = ErrorCodeTable::standard();
        assert_eq!(table.kind(&err(0x400)), ErrorKind::NotImplemented);
        assert_eq!(table.kind(&err(0x401)), ErrorKind::InvalidValue);
        assert_eq!(table.kind(&err(0x402)), ErrorKind::ValueNotSet);
        assert_eq!(table.kind(&err(0x407)), ErrorKind::NotConnected);
        assert_eq!(table.kind(&err(0x408)), ErrorKind::InvalidWhileParked);
        assert_eq!(table.kind(&err(0x409)), ErrorKind::InvalidWhileSlaved);
        assert_eq!(table.kind(&err(0x40B)), ErrorKind::InvalidOperation);
        assert_eq!(table.kind(&err(0x40C)), ErrorKind::NotImplemented);
        assert_eq!(table.kind(&err(0x500)), ErrorKind::Other);
    }

    #[test]
    fn com_hresults_map_to_standard_kinds() {
        let table = ErrorCodeTable::standard();
        assert_eq!(
            table.kind(&err(0x8004_0401_u32 as i32)),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            table.kind(&err(0x8004_0400_u32 as i32)),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn transport_errors_are_other() {
        let table = ErrorCodeTable::standard();
        let err = DeviceError::Transport("refused".to_string());
        assert_eq!(table.kind(&err), ErrorKind::Other);
        assert!(!table.is_not_set(&err));
    }

    #[test]
    fn legacy_codes_apply_only_to_matching_driver() {
        let legacy = vec![LegacyErrorCodes {
            driver: "gemini".to_string(),
            invalid_value: vec![0x1234],
            value_not_set: vec![0x1235],
            ..Default::default()
        }];

        let gemini = ErrorCodeTable::for_driver("Gemini Telescope .NET", &legacy);
        assert!(gemini.is_invalid_value(&err(0x1234)));
        assert!(gemini.is_not_set(&err(0x1235)));

        let other = ErrorCodeTable::for_driver("Some Other Mount", &legacy);
        assert_eq!(other.kind(&err(0x1234)), ErrorKind::Other);
    }

    #[test]
    fn not_set_accepts_all_three_shapes() {
        let legacy = vec![LegacyErrorCodes {
            driver: "old".to_string(),
            value_not_set: vec![0x80040402_u32 as i32 + 0x100],
            ..Default::default()
        }];
        let table = ErrorCodeTable::for_driver("old driver", &legacy);

        assert!(table.is_not_set(&err(0x402)));
        assert!(table.is_not_set(&err(0x40B)));
        assert!(table.is_not_set(&err(0x80040402_u32 as i32 + 0x100)));
        assert!(!table.is_not_set(&err(0x401)));
    }

    #[test]
    fn not_implemented_when_mandatory_is_issue() {
        let (outcome, message) = classify_error(
            &ErrorCodeTable::standard(),
            MemberType::Property,
            Required::Mandatory,
            &err(0x400),
            "Declination",
        );
        assert_eq!(outcome, Outcome::Issue);
        assert!(message.contains("mandatory"));
    }

    #[test]
    fn not_implemented_when_must_not_be_implemented_is_ok() {
        let (outcome, _) = classify_error(
            &ErrorCodeTable::standard(),
            MemberType::Method,
            Required::MustNotBeImplemented,
            &err(0x400),
            "CanPark is False",
        );
        assert_eq!(outcome, Outcome::Ok);
    }

    #[test]
    fn capability_true_error_names_the_flag() {
        for code in [0x400, 0x401, 0x40B, 0x500] {
            let (outcome, message) = classify_error(
                &ErrorCodeTable::standard(),
                MemberType::Method,
                Required::MustBeImplemented,
                &err(code),
                "CanFindHome is True",
            );
            assert_eq!(outcome, Outcome::Issue, "code 0x{code:X}");
            assert!(message.contains("CanFindHome"), "{message}");
        }
    }

    #[test]
    fn wrong_error_when_must_not_be_implemented_is_issue() {
        let (outcome, _) = classify_error(
            &ErrorCodeTable::standard(),
            MemberType::Method,
            Required::MustNotBeImplemented,
            &err(0x401),
            "CanSync is False",
        );
        assert_eq!(outcome, Outcome::Issue);
    }

    #[test]
    fn optional_not_implemented_is_ok() {
        let (outcome, _) = classify_error(
            &ErrorCodeTable::standard(),
            MemberType::Property,
            Required::Optional,
            &err(0x400),
            "Altitude",
        );
        assert_eq!(outcome, Outcome::Ok);
    }
}
