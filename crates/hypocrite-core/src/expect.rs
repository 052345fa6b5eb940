//! Expectation matching against a mock's call ledger.
//!
//! An [`ExpectedCall`] lists one [`Expect`] per declared argument position.
//! [`Expect::Any`] skips the comparison for that position. Verification
//! first compares the number of expected calls with the number recorded,
//! then walks the common prefix comparing argument by argument.

use std::fmt;

use crate::ledger::CallRecord;
use crate::value::{ArgValue, MockSignature};

/// Expectation for a single argument position.
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    Any,
    Value(ArgValue),
}

/// One anticipated call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpectedCall {
    args: Vec<Expect>,
}

impl ExpectedCall {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the next argument to equal `value`.
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(Expect::Value(value.into()));
        self
    }

    /// Ignore the next argument.
    #[must_use]
    pub fn any(mut self) -> Self {
        self.args.push(Expect::Any);
        self
    }

    /// Build from the bit-mask form: bit `1 << p` set means position `p` is
    /// ignored, and its entry in `values` is not consulted.
    #[must_use]
    pub fn from_mask(mask: u64, values: Vec<ArgValue>) -> Self {
        let args = values
            .into_iter()
            .enumerate()
            .map(|(p, v)| {
                if p < 64 && mask & (1u64 << p) != 0 {
                    Expect::Any
                } else {
                    Expect::Value(v)
                }
            })
            .collect();
        Self { args }
    }

    #[must_use]
    pub fn args(&self) -> &[Expect] {
        &self.args
    }
}

/// A single verification failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// Number of expected calls differs from the number recorded.
    Count { expected: usize, actual: usize },
    /// An expectation lists a different number of arguments than declared.
    Arity {
        index: usize,
        expected: usize,
        declared: usize,
    },
    Argument {
        index: usize,
        position: usize,
        name: String,
        expected: ArgValue,
        actual: ArgValue,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { expected, actual } => {
                write!(f, "expected {expected} calls, got {actual}")
            }
            Self::Arity {
                index,
                expected,
                declared,
            } => write!(
                f,
                "call {index}: expectation lists {expected} arguments, mock declares {declared}"
            ),
            Self::Argument {
                index,
                name,
                expected,
                actual,
                ..
            } => write!(
                f,
                "call {index}: argument {name}: expected {expected}, got {actual}"
            ),
        }
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerifyReport {
    mock: String,
    mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    #[must_use]
    pub fn mock(&self) -> &str {
        &self.mock
    }

    /// One diagnostic line per mismatch, prefixed with the mock name.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<String> {
        self.mismatches
            .iter()
            .map(|m| format!("{}: {m}", self.mock))
            .collect()
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "{}: calls match", self.mock);
        }
        for (i, line) in self.diagnostics().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Compare `expected` against the recorded calls of the mock described by
/// `signature`.
#[must_use]
pub fn verify(
    signature: &MockSignature,
    expected: &[ExpectedCall],
    actual: &[CallRecord],
) -> VerifyReport {
    let mut mismatches = Vec::new();

    if expected.len() != actual.len() {
        mismatches.push(Mismatch::Count {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    for (index, (exp, act)) in expected.iter().zip(actual).enumerate() {
        if exp.args.len() != signature.arity() {
            mismatches.push(Mismatch::Arity {
                index,
                expected: exp.args.len(),
                declared: signature.arity(),
            });
            continue;
        }
        for (position, (want, got)) in exp.args.iter().zip(&act.args).enumerate() {
            let Expect::Value(want) = want else { continue };
            if want != got {
                mismatches.push(Mismatch::Argument {
                    index,
                    position,
                    name: signature.args[position].name.clone(),
                    expected: want.clone(),
                    actual: got.clone(),
                });
            }
        }
    }

    VerifyReport {
        mock: signature.name.clone(),
        mismatches,
    }
}
