//! Error types for the mock and fixture runtime.
//!
//! [`HypoError`] covers defects in the test itself (bad ledger index, wrong
//! argument count, unknown argument name). They are never absorbed into a
//! per-test outcome. [`FixtureError`] is the failure of a fixture setup and
//! is escalated to FATAL for the current test.

use thiserror::Error;

use crate::value::ArgType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HypoError {
    #[error("mock {mock}: call index {index} out of range (ledger holds {len} calls)")]
    OutOfRange {
        mock: String,
        index: usize,
        len: usize,
    },
    #[error("mock {mock}: no argument named {name:?}")]
    UnknownArgument { mock: String, name: String },
    #[error("mock {mock}: called with {actual} arguments, declared {declared}")]
    ArityMismatch {
        mock: String,
        declared: usize,
        actual: usize,
    },
    #[error("mock {mock}: argument {arg} declared {declared}, got {actual}")]
    TypeMismatch {
        mock: String,
        arg: String,
        declared: ArgType,
        actual: ArgType,
    },
    #[error("mock {mock}: result is {actual}, declared return type is {declared}")]
    ReturnMismatch {
        mock: String,
        declared: ArgType,
        actual: ArgType,
    },
    #[error("mock {0} declared twice")]
    DuplicateMock(String),
    #[error("no mock named {0}")]
    UnknownMock(String),
    #[error("injected value {index} out of range ({len} injected)")]
    InjectedOutOfRange { index: usize, len: usize },
    #[error("injected value {index} ({fixture}) is not a {expected}")]
    InjectedType {
        index: usize,
        fixture: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("fixture {fixture}: setup failed: {reason}")]
    Setup { fixture: String, reason: String },
    #[error("fixture {fixture}: setup token has an unexpected type")]
    Token { fixture: String },
}

impl FixtureError {
    #[must_use]
    pub fn setup(fixture: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Setup {
            fixture: fixture.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn fixture(&self) -> &str {
        match self {
            Self::Setup { fixture, .. } | Self::Token { fixture } => fixture,
        }
    }
}

pub type Result<T, E = HypoError> = std::result::Result<T, E>;
