//! State and helpers shared by every tester
//!
//! A [`TestContext`] owns the report being built, the cancellation token
//! and the error code table for the device under test. Testers record
//! through it and route every device error through its classification
//! helpers so the OK/Issue decision lives in one place.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::classify::{classify_error, ErrorCodeTable, MemberType, Required};
use crate::config::GeneralConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::report::{Outcome, Report};
use crate::wait::{self, WaitError};

pub struct TestContext {
    pub report: Report,
    pub errors: ErrorCodeTable,
    pub poll_interval: Duration,
    pub perf_loop_time: Duration,
    cancel: CancellationToken,
}

impl TestContext {
    pub fn new(device: &str, general: &GeneralConfig, cancel: CancellationToken) -> Self {
        Self {
            report: Report::new(device),
            errors: ErrorCodeTable::standard(),
            poll_interval: general.poll_interval,
            perf_loop_time: general.perf_loop_time,
            cancel,
        }
    }

    pub fn ok(&mut self, test: &str, message: impl Into<String>) {
        self.report.ok(test, message);
    }

    pub fn issue(&mut self, test: &str, message: impl Into<String>) {
        self.report.issue(test, message);
    }

    pub fn info(&mut self, test: &str, message: impl Into<String>) {
        self.report.info(test, message);
    }

    pub fn debug(&mut self, test: &str, message: impl Into<String>) {
        self.report.debug(test, message);
    }

    /// Trace line for a driver call that is about to happen
    pub fn call_to_driver(&self, test: &str, call: &str) {
        tracing::trace!(target: "driver_calls", "{}: about to call {}", test, call);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Classify an error from a member call and record the outcome
    pub fn handle_exception(
        &mut self,
        test: &str,
        member_type: MemberType,
        required: Required,
        err: &DeviceError,
        user_message: &str,
    ) {
        let (outcome, message) =
            classify_error(&self.errors, member_type, required, err, user_message);
        self.report.record(outcome, test, message);
    }

    /// An InvalidValue error is what the test expected, anything else is classified normally
    pub fn handle_invalid_value_exception_as_ok(
        &mut self,
        test: &str,
        member_type: MemberType,
        required: Required,
        err: &DeviceError,
        user_action: &str,
        ok_message: &str,
    ) {
        if self.errors.is_invalid_value(err) {
            self.ok(test, ok_message);
        } else {
            self.handle_exception(test, member_type, required, err, user_action);
        }
    }

    /// Like [`Self::handle_invalid_value_exception_as_ok`] but only informational
    pub fn handle_invalid_value_exception_as_info(
        &mut self,
        test: &str,
        member_type: MemberType,
        required: Required,
        err: &DeviceError,
        user_action: &str,
        info_message: &str,
    ) {
        if self.errors.is_invalid_value(err) {
            self.info(test, info_message);
        } else {
            self.handle_exception(test, member_type, required, err, user_action);
        }
    }

    /// Apply the capability contract to the result of a gated member.
    ///
    /// With the capability true the call must succeed and the value is
    /// returned for range checking. With it false the call must fail with
    /// NotImplemented.
    pub fn check_gated<T>(
        &mut self,
        test: &str,
        member_type: MemberType,
        capability: bool,
        capability_name: &str,
        result: DeviceResult<T>,
    ) -> Option<T> {
        match (capability, result) {
            (true, Ok(value)) => Some(value),
            (true, Err(err)) => {
                let message = format!("{} is True", capability_name);
                self.handle_exception(
                    test,
                    member_type,
                    Required::MustBeImplemented,
                    &err,
                    &message,
                );
                None
            }
            (false, Ok(_)) => {
                self.issue(
                    test,
                    format!(
                        "{} is False but {} did not return a NotImplemented error",
                        capability_name, test
                    ),
                );
                None
            }
            (false, Err(err)) => {
                let message = format!("{} is False", capability_name);
                self.handle_exception(
                    test,
                    member_type,
                    Required::MustNotBeImplemented,
                    &err,
                    &message,
                );
                None
            }
        }
    }

    /// Poll `busy` at the context's poll interval
    pub async fn wait_while<F, Fut>(
        &self,
        action: &str,
        busy: F,
        timeout: Duration,
    ) -> Result<Duration, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DeviceResult<bool>>,
    {
        wait::wait_while(action, busy, self.poll_interval, timeout, &self.cancel).await
    }

    pub async fn wait_for(&self, duration: Duration) -> Result<(), WaitError> {
        wait::wait_for(duration, &self.cancel).await
    }

    /// Record the result of a failed wait against `test`
    pub fn report_wait_error(&mut self, test: &str, err: &WaitError, user_message: &str) {
        match err {
            WaitError::Cancelled => self.debug(test, "Cancelled while waiting"),
            WaitError::TimedOut { .. } => self.issue(test, format!("{}: {}", user_message, err)),
            WaitError::Device(device_err) => self.handle_exception(
                test,
                MemberType::Property,
                Required::Mandatory,
                device_err,
                user_message,
            ),
        }
    }

    pub fn issue_count(&self) -> usize {
        self.report.count(Outcome::Issue)
    }

    pub fn into_report(self) -> Report {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TestContext {
        TestContext::new("Test", &GeneralConfig::default(), CancellationToken::new())
    }

    #[test]
    fn capability_false_but_works_is_issue() {
        let mut ctx = context();
        let value = ctx.check_gated("FindHome", MemberType::Method, false, "CanFindHome", Ok(()));

        assert!(value.is_none());
        assert_eq!(ctx.report.count(Outcome::Issue), 1);
        assert_eq!(ctx.report.count(Outcome::Ok), 0);
        assert!(ctx.report.entries[0]
            .message
            .contains("CanFindHome is False"));
    }

    #[test]
    fn capability_true_error_is_issue_naming_flag() {
        let mut ctx = context();
        let result: DeviceResult<()> = Err(DeviceError::ascom(0x400, "not implemented"));
        ctx.check_gated("FindHome", MemberType::Method, true, "CanFindHome", result);

        assert_eq!(ctx.report.count(Outcome::Issue), 1);
        assert!(ctx.report.entries[0].message.contains("CanFindHome"));
    }

    #[test]
    fn capability_false_not_implemented_is_ok() {
        let mut ctx = context();
        let result: DeviceResult<()> = Err(DeviceError::ascom(0x400, "not implemented"));
        ctx.check_gated("Park", MemberType::Method, false, "CanPark", result);

        assert_eq!(ctx.report.count(Outcome::Ok), 1);
        assert_eq!(ctx.report.count(Outcome::Issue), 0);
    }

    #[test]
    fn capability_true_success_returns_value() {
        let mut ctx = context();
        let value = ctx.check_gated(
            "IsPulseGuiding",
            MemberType::Property,
            true,
            "CanPulseGuide",
            Ok(false),
        );

        assert_eq!(value, Some(false));
        assert!(ctx.report.entries.is_empty());
    }

    #[test]
    fn invalid_value_as_ok() {
        let mut ctx = context();
        ctx.handle_invalid_value_exception_as_ok(
            "SiteLatitude Write",
            MemberType::Property,
            Required::Optional,
            &DeviceError::ascom(0x401, "bad"),
            "Setting -91",
            "Invalid value rejected",
        );
        assert_eq!(ctx.report.count(Outcome::Ok), 1);

        ctx.handle_invalid_value_exception_as_ok(
            "SiteLatitude Write",
            MemberType::Property,
            Required::Optional,
            &DeviceError::ascom(0x500, "driver error"),
            "Setting -91",
            "Invalid value rejected",
        );
        assert_eq!(ctx.report.count(Outcome::Issue), 1);
    }
}
