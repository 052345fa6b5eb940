//! Mock controller and registry.
//!
//! Every declared mock owns one [`MockDescriptor`]: its signature, its
//! spy/strict mode and its [`CallLedger`]. Code under test reaches a
//! function through the [`CallTarget`] seam, so a test installs either the
//! real implementation ([`RealFn`]) or a [`MockHandle`] wrapping it.
//!
//! State machine per mock: `Spy` (initial) → `Strict` via
//! [`MockHandle::set_strict`]; [`MockHandle::cleanup`] returns to `Spy`
//! and empties the ledger.

use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::TestContext;
use crate::error::{HypoError, Result};
use crate::expect::{ExpectedCall, VerifyReport, verify};
use crate::ledger::{CallLedger, CallRecord};
use crate::value::{ArgValue, MockSignature};

/// Signature of a real (wrapped) implementation.
pub type RealImpl = Arc<dyn Fn(&[ArgValue]) -> ArgValue + Send + Sync>;

/// Indirection through which code under test calls a mockable function.
pub trait CallTarget: Send + Sync {
    /// Call with an explicit call-site location.
    fn call_at(&self, file: &'static str, line: u32, args: Vec<ArgValue>) -> Result<ArgValue>;
}

/// A plain real implementation behind the [`CallTarget`] seam.
#[derive(Clone)]
pub struct RealFn(RealImpl);

impl RealFn {
    pub fn new(f: impl Fn(&[ArgValue]) -> ArgValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn into_impl(self) -> RealImpl {
        self.0
    }
}

impl CallTarget for RealFn {
    fn call_at(&self, _file: &'static str, _line: u32, args: Vec<ArgValue>) -> Result<ArgValue> {
        Ok((self.0)(&args))
    }
}

/// Spy forwards to the real implementation; strict returns the stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    #[default]
    Spy,
    Strict,
}

pub struct MockDescriptor {
    signature: MockSignature,
    mode: MockMode,
    ledger: CallLedger,
    real: RealImpl,
    stub: Option<ArgValue>,
}

impl MockDescriptor {
    #[must_use]
    pub fn new(signature: MockSignature, real: RealImpl) -> Self {
        Self {
            ledger: CallLedger::new(signature.name.clone()),
            signature,
            mode: MockMode::Spy,
            real,
            stub: None,
        }
    }

    fn validate(&self, args: &[ArgValue]) -> Result<()> {
        let sig = &self.signature;
        if args.len() != sig.arity() {
            return Err(HypoError::ArityMismatch {
                mock: sig.name.clone(),
                declared: sig.arity(),
                actual: args.len(),
            });
        }
        for (spec, value) in sig.args.iter().zip(args) {
            if spec.ty != value.ty() {
                return Err(HypoError::TypeMismatch {
                    mock: sig.name.clone(),
                    arg: spec.name.clone(),
                    declared: spec.ty,
                    actual: value.ty(),
                });
            }
        }
        Ok(())
    }
}

/// Shared handle to one mock's descriptor. Cloning is cheap; all clones
/// observe the same ledger and mode.
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<MockDescriptor>>,
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.inner.lock();
        f.debug_struct("MockHandle")
            .field("name", &d.signature.name)
            .field("mode", &d.mode)
            .field("calls", &d.ledger.len())
            .finish()
    }
}

impl MockHandle {
    #[must_use]
    pub fn new(signature: MockSignature, real: RealImpl) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockDescriptor::new(signature, real))),
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.inner.lock().signature.name.clone()
    }

    #[must_use]
    pub fn signature(&self) -> MockSignature {
        self.inner.lock().signature.clone()
    }

    /// Invoke the mock, recording the caller's location.
    #[track_caller]
    pub fn invoke(&self, args: Vec<ArgValue>) -> Result<ArgValue> {
        let loc = Location::caller();
        self.invoke_at(loc.file(), loc.line(), args)
    }

    /// Invoke the mock with an explicit call-site location.
    ///
    /// The call is recorded before the real implementation runs. The lock is
    /// released while forwarding so the real function may itself call mocks.
    pub fn invoke_at(&self, file: &'static str, line: u32, args: Vec<ArgValue>) -> Result<ArgValue> {
        let (forward, name, returns) = {
            let mut d = self.inner.lock();
            d.validate(&args)?;
            d.ledger.append(CallRecord::new(file, line, args.clone()));
            let returns = d.signature.returns;
            match d.mode {
                MockMode::Spy => (Arc::clone(&d.real), d.signature.name.clone(), returns),
                MockMode::Strict => {
                    return Ok(d.stub.clone().unwrap_or_else(|| returns.zero()));
                }
            }
        };
        // The real result is held to the declared return type, like a stub.
        let out = forward(&args);
        if out.ty() != returns {
            return Err(HypoError::ReturnMismatch {
                mock: name,
                declared: returns,
                actual: out.ty(),
            });
        }
        Ok(out)
    }

    /// Stop forwarding to the real implementation. Idempotent.
    pub fn set_strict(&self) {
        self.inner.lock().mode = MockMode::Strict;
    }

    /// Set the value returned while strict. Defaults to the return type's zero.
    pub fn set_stub(&self, value: impl Into<ArgValue>) -> Result<()> {
        let value = value.into();
        let mut d = self.inner.lock();
        if value.ty() != d.signature.returns {
            return Err(HypoError::ReturnMismatch {
                mock: d.signature.name.clone(),
                declared: d.signature.returns,
                actual: value.ty(),
            });
        }
        d.stub = Some(value);
        Ok(())
    }

    #[must_use]
    pub fn mode(&self) -> MockMode {
        self.inner.lock().mode
    }

    /// Verify the ledger without touching the context.
    #[must_use]
    pub fn verify(&self, expected: &[ExpectedCall]) -> VerifyReport {
        let d = self.inner.lock();
        verify(&d.signature, expected, d.ledger.records())
    }

    /// Verify the ledger against `expected`; on mismatch set FAIL on `ctx`
    /// with one diagnostic per mismatch. The ledger is left intact.
    pub fn check_calls(&self, ctx: &mut TestContext, expected: &[ExpectedCall]) -> bool {
        let report = self.verify(expected);
        for line in report.diagnostics() {
            ctx.fail(line);
        }
        report.passed()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.lock().ledger.len()
    }

    pub fn get_call(&self, index: usize) -> Result<CallRecord> {
        self.inner.lock().ledger.get(index).cloned()
    }

    pub fn get_file(&self, index: usize) -> Result<&'static str> {
        Ok(self.inner.lock().ledger.get(index)?.file)
    }

    pub fn get_line(&self, index: usize) -> Result<u32> {
        Ok(self.inner.lock().ledger.get(index)?.line)
    }

    pub fn get_arg(&self, index: usize, name: &str) -> Result<ArgValue> {
        let d = self.inner.lock();
        let record = d.ledger.get(index)?;
        let position = d
            .signature
            .position(name)
            .ok_or_else(|| HypoError::UnknownArgument {
                mock: d.signature.name.clone(),
                name: name.to_string(),
            })?;
        Ok(record.args[position].clone())
    }

    /// Empty the ledger, drop any stub and return to spy mode.
    pub fn cleanup(&self) {
        let mut d = self.inner.lock();
        d.ledger.clear();
        d.mode = MockMode::Spy;
        d.stub = None;
    }
}

impl CallTarget for MockHandle {
    fn call_at(&self, file: &'static str, line: u32, args: Vec<ArgValue>) -> Result<ArgValue> {
        self.invoke_at(file, line, args)
    }
}

/// Call through a [`CallTarget`], recording this source location.
///
/// ```ignore
/// let n = hypo_call!(write_fn, fd, buf.as_slice(), len)?;
/// ```
#[macro_export]
macro_rules! hypo_call {
    ($target:expr $(, $arg:expr)* $(,)?) => {{
        use $crate::mock::CallTarget as _;
        ($target).call_at(
            file!(),
            line!(),
            vec![$($crate::value::ArgValue::from($arg)),*],
        )
    }};
}

/// One descriptor per declared mock name, owned by the test session.
#[derive(Debug, Default)]
pub struct MockRegistry {
    mocks: BTreeMap<String, MockHandle>,
}

impl MockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a mock wrapping `real`. Names are unique per registry.
    pub fn declare(
        &mut self,
        signature: MockSignature,
        real: impl Fn(&[ArgValue]) -> ArgValue + Send + Sync + 'static,
    ) -> Result<MockHandle> {
        if self.mocks.contains_key(&signature.name) {
            return Err(HypoError::DuplicateMock(signature.name));
        }
        let name = signature.name.clone();
        let handle = MockHandle::new(signature, Arc::new(real));
        self.mocks.insert(name, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Result<MockHandle> {
        self.mocks
            .get(name)
            .cloned()
            .ok_or_else(|| HypoError::UnknownMock(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mocks.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    /// Reset every declared mock. Returns how many were reset.
    pub fn cleanup_all(&self) -> usize {
        for handle in self.mocks.values() {
            handle.cleanup();
        }
        self.mocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArgType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn add_mock(counter: Arc<AtomicUsize>) -> MockHandle {
        let sig = MockSignature::new("add")
            .arg("a", ArgType::Int)
            .arg("b", ArgType::Int)
            .returns(ArgType::Int);
        MockHandle::new(
            sig,
            Arc::new(move |args: &[ArgValue]| {
                counter.fetch_add(1, Ordering::SeqCst);
                let a = args[0].as_int().unwrap_or_default();
                let b = args[1].as_int().unwrap_or_default();
                ArgValue::Int(a + b)
            }),
        )
    }

    #[test]
    fn spy_records_and_forwards() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mock = add_mock(Arc::clone(&counter));
        let out = mock.invoke(vec![2.into(), 3.into()]).unwrap();
        assert_eq!(out, ArgValue::Int(5));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(mock.get_file(0).unwrap(), file!());
    }

    #[test]
    fn strict_records_without_forwarding() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mock = add_mock(Arc::clone(&counter));
        mock.set_strict();
        mock.set_strict();
        assert_eq!(mock.mode(), MockMode::Strict);
        assert_eq!(mock.invoke(vec![2.into(), 3.into()]).unwrap(), ArgValue::Int(0));
        mock.set_stub(42).unwrap();
        assert_eq!(mock.invoke(vec![2.into(), 3.into()]).unwrap(), ArgValue::Int(42));
        assert_eq!(mock.call_count(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cleanup_resets_mode_ledger_and_stub() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        mock.set_strict();
        mock.set_stub(9).unwrap();
        mock.invoke(vec![1.into(), 1.into()]).unwrap();
        mock.cleanup();
        assert_eq!(mock.call_count(), 0);
        assert_eq!(mock.mode(), MockMode::Spy);
        assert_eq!(mock.invoke(vec![1.into(), 1.into()]).unwrap(), ArgValue::Int(2));
    }

    #[test]
    fn accessors_fail_out_of_range() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(mock.get_file(0), Err(HypoError::OutOfRange { .. })));
        assert!(matches!(mock.get_line(0), Err(HypoError::OutOfRange { .. })));
        assert!(matches!(mock.get_arg(0, "a"), Err(HypoError::OutOfRange { .. })));
    }

    #[test]
    fn get_arg_by_name() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        mock.invoke(vec![4.into(), 7.into()]).unwrap();
        assert_eq!(mock.get_arg(0, "b").unwrap(), ArgValue::Int(7));
        assert!(matches!(
            mock.get_arg(0, "c"),
            Err(HypoError::UnknownArgument { .. })
        ));
    }

    #[test]
    fn arity_and_type_are_checked_before_recording() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(
            mock.invoke(vec![1.into()]),
            Err(HypoError::ArityMismatch { declared: 2, actual: 1, .. })
        ));
        assert!(matches!(
            mock.invoke(vec![1.into(), "x".into()]),
            Err(HypoError::TypeMismatch { .. })
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn stub_type_must_match_return_type() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(
            mock.set_stub("nope"),
            Err(HypoError::ReturnMismatch { .. })
        ));
    }

    #[test]
    fn spy_result_must_match_return_type() {
        let mock = MockHandle::new(
            MockSignature::new("getpid").returns(ArgType::Int),
            Arc::new(|_: &[ArgValue]| ArgValue::UInt(7)),
        );
        assert!(matches!(
            mock.invoke(vec![]),
            Err(HypoError::ReturnMismatch {
                declared: ArgType::Int,
                actual: ArgType::UInt,
                ..
            })
        ));
        assert_eq!(mock.call_count(), 1, "the call is recorded before forwarding");
        mock.set_strict();
        assert_eq!(mock.invoke(vec![]).unwrap(), ArgValue::Int(0));
    }

    #[test]
    fn check_calls_sets_fail_and_keeps_ledger() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        let mut ctx = TestContext::new("t.c");
        ctx.begin_test("check");
        mock.invoke(vec![1.into(), 2.into()]).unwrap();

        assert!(mock.check_calls(&mut ctx, &[ExpectedCall::new().arg(1).arg(2)]));
        assert!(!ctx.failed());
        assert!(!mock.check_calls(&mut ctx, &[]));
        assert!(ctx.failed());
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn hypo_call_records_this_line() {
        let mock = add_mock(Arc::new(AtomicUsize::new(0)));
        let line = line!() + 1;
        let out = crate::hypo_call!(mock, 1i32, 2i32).unwrap();
        assert_eq!(out, ArgValue::Int(3));
        assert_eq!(mock.get_line(0).unwrap(), line);
    }

    #[test]
    fn real_fn_is_interchangeable_with_mock() {
        let real = RealFn::new(|args| ArgValue::Int(args.len() as i64));
        let targets: Vec<Box<dyn CallTarget>> = vec![
            Box::new(real.clone()),
            Box::new(MockHandle::new(
                MockSignature::new("len").arg("x", ArgType::Int).returns(ArgType::Int),
                real.into_impl(),
            )),
        ];
        for t in &targets {
            assert_eq!(t.call_at("f.c", 1, vec![ArgValue::Int(0)]).unwrap(), ArgValue::Int(1));
        }
    }

    #[test]
    fn registry_rejects_duplicates_and_cleans_everything() {
        let mut reg = MockRegistry::new();
        let a = reg
            .declare(MockSignature::new("a"), |_| ArgValue::Void)
            .unwrap();
        let b = reg
            .declare(MockSignature::new("b"), |_| ArgValue::Void)
            .unwrap();
        assert!(matches!(
            reg.declare(MockSignature::new("a"), |_| ArgValue::Void),
            Err(HypoError::DuplicateMock(_))
        ));
        a.set_strict();
        a.invoke(vec![]).unwrap();
        b.invoke(vec![]).unwrap();
        assert_eq!(reg.cleanup_all(), 2);
        assert_eq!(a.call_count() + b.call_count(), 0);
        assert_eq!(a.mode(), MockMode::Spy);
        assert_eq!(reg.get("b").unwrap().name(), "b");
        assert!(matches!(reg.get("zz"), Err(HypoError::UnknownMock(_))));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
