//! # hypocrite-core
//!
//! Runtime engine behind hypocrite unit tests for C-like code:
//! - [`ledger`]: per-mock record of actual invocations
//! - [`expect`]: expectation matching with per-argument wildcards
//! - [`mock`]: spy/strict mock controller, call seam and registry
//! - [`fixture`]: ordered fixture setup, injection and teardown
//! - [`context`]: run-wide FAIL/FATAL flags shared with test bodies
//!
//! Sequencing of tests lives in `hypocrite-harness`.

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod expect;
pub mod fixture;
pub mod ledger;
pub mod mock;
pub mod value;

pub use context::TestContext;
pub use error::{FixtureError, HypoError};
pub use expect::{Expect, ExpectedCall, Mismatch, VerifyReport};
pub use fixture::{Fixture, FixtureRun, FixtureUse, Injected};
pub use ledger::{CallLedger, CallRecord};
pub use mock::{CallTarget, MockHandle, MockMode, MockRegistry, RealFn};
pub use value::{ArgSpec, ArgType, ArgValue, MockSignature};
