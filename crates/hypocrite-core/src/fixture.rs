//! Fixture lifecycle: ordered setup, value injection, ordered teardown.
//!
//! A fixture's setup produces a typed value; the same closure pair that
//! produced it is the only code that unpacks it for teardown, so the value
//! type is fixed at declaration. Teardown runs in the same order as setup,
//! not reversed.

use std::any::{Any, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::TestContext;
use crate::error::{FixtureError, HypoError, Result};

type Token = Arc<dyn Any + Send + Sync>;
type SetupFn = Box<dyn Fn(&mut TestContext) -> std::result::Result<Token, String> + Send + Sync>;
type TeardownFn =
    Box<dyn Fn(&mut TestContext, Token) -> std::result::Result<(), FixtureError> + Send + Sync>;

/// A declared fixture. Shared between every test that uses it.
pub struct Fixture {
    name: String,
    value_type: Option<&'static str>,
    setup: SetupFn,
    teardown: Option<TeardownFn>,
    cleanup: bool,
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("teardown", &self.teardown.is_some())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

impl Fixture {
    /// Declare a fixture whose setup returns a value of type `T`.
    pub fn returning<T, S>(name: impl Into<String>, setup: S) -> FixtureBuilder<T>
    where
        T: Clone + Send + Sync + 'static,
        S: Fn(&mut TestContext) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        FixtureBuilder::new(name.into(), Some(type_name::<T>()), setup)
    }

    /// Declare a fixture that returns nothing.
    pub fn unit<S>(name: impl Into<String>, setup: S) -> FixtureBuilder<()>
    where
        S: Fn(&mut TestContext) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        FixtureBuilder::new(name.into(), None, setup)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether setup yields a value that can be injected.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.value_type.is_some()
    }

    #[must_use]
    pub fn value_type(&self) -> Option<&'static str> {
        self.value_type
    }

    /// Whether teardown runs after the test.
    #[must_use]
    pub fn cleanup(&self) -> bool {
        self.cleanup && self.teardown.is_some()
    }
}

/// Typed builder for [`Fixture`].
pub struct FixtureBuilder<T> {
    name: String,
    value_type: Option<&'static str>,
    setup: SetupFn,
    teardown: Option<TeardownFn>,
    cleanup: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> FixtureBuilder<T> {
    fn new<S>(name: String, value_type: Option<&'static str>, setup: S) -> Self
    where
        S: Fn(&mut TestContext) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        Self {
            name,
            value_type,
            setup: Box::new(move |ctx: &mut TestContext| setup(ctx).map(|v| Arc::new(v) as Token)),
            teardown: None,
            cleanup: true,
            _value: PhantomData,
        }
    }

    /// Attach a teardown that receives the value produced by setup.
    #[must_use]
    pub fn teardown<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&mut TestContext, T) + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.teardown = Some(Box::new(move |ctx: &mut TestContext, token: Token| {
            let value = token
                .downcast::<T>()
                .map_err(|_| FixtureError::Token {
                    fixture: name.clone(),
                })?;
            let value = Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone());
            teardown(ctx, value);
            Ok(())
        }));
        self
    }

    /// Keep the teardown declared but do not run it.
    #[must_use]
    pub fn without_cleanup(mut self) -> Self {
        self.cleanup = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Fixture> {
        Arc::new(Fixture {
            name: self.name,
            value_type: self.value_type,
            setup: self.setup,
            teardown: self.teardown,
            cleanup: self.cleanup,
        })
    }
}

/// A fixture as used by one test, with its inject flag.
#[derive(Debug, Clone)]
pub struct FixtureUse {
    pub fixture: Arc<Fixture>,
    pub inject: bool,
}

impl FixtureUse {
    #[must_use]
    pub fn inject(fixture: &Arc<Fixture>) -> Self {
        Self {
            fixture: Arc::clone(fixture),
            inject: true,
        }
    }

    #[must_use]
    pub fn plain(fixture: &Arc<Fixture>) -> Self {
        Self {
            fixture: Arc::clone(fixture),
            inject: false,
        }
    }
}

struct Slot {
    fixture: Arc<Fixture>,
    inject: bool,
    token: Option<Token>,
    set_up: bool,
    torn_down: bool,
}

/// Per-test instantiation of a test's fixture list.
pub struct FixtureRun {
    slots: Vec<Slot>,
}

impl FixtureRun {
    #[must_use]
    pub fn new(uses: &[FixtureUse]) -> Self {
        Self {
            slots: uses
                .iter()
                .map(|u| Slot {
                    fixture: Arc::clone(&u.fixture),
                    inject: u.inject,
                    token: None,
                    set_up: false,
                    torn_down: false,
                })
                .collect(),
        }
    }

    /// Run every setup in declared order. The first failure raises FATAL on
    /// `ctx` and stops; fixtures already set up stay eligible for teardown.
    pub fn run_setup(&mut self, ctx: &mut TestContext) -> Result<(), FixtureError> {
        for slot in &mut self.slots {
            match (slot.fixture.setup)(ctx) {
                Ok(token) => {
                    slot.token = Some(token);
                    slot.set_up = true;
                }
                Err(reason) => {
                    let err = FixtureError::setup(slot.fixture.name.clone(), reason);
                    ctx.fatal(err.to_string());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Names of fixtures whose setup completed, in setup order.
    #[must_use]
    pub fn completed(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.set_up)
            .map(|s| s.fixture.name())
            .collect()
    }

    /// Tear down, in setup order, every completed fixture with cleanup
    /// enabled. Each fixture is torn down at most once; returns the names
    /// torn down by this call.
    pub fn run_teardown(&mut self, ctx: &mut TestContext) -> Vec<String> {
        let mut done = Vec::new();
        for slot in &mut self.slots {
            if slot.torn_down || !slot.fixture.cleanup() {
                continue;
            }
            let (Some(token), Some(teardown)) = (slot.token.take(), &slot.fixture.teardown) else {
                continue;
            };
            slot.torn_down = true;
            if let Err(err) = teardown(ctx, token) {
                ctx.fail(err.to_string());
            }
            done.push(slot.fixture.name.clone());
        }
        done
    }

    /// Values passed positionally into the test body.
    #[must_use]
    pub fn injected(&self) -> Injected {
        let values = self
            .slots
            .iter()
            .filter(|s| s.inject && s.fixture.returns_value())
            .filter_map(|s| {
                s.token.as_ref().map(|token| InjectedValue {
                    fixture: s.fixture.name.clone(),
                    value: Arc::clone(token),
                })
            })
            .collect();
        Injected { values }
    }
}

struct InjectedValue {
    fixture: String,
    value: Token,
}

/// Ordered fixture values handed to a test body.
#[derive(Default)]
pub struct Injected {
    values: Vec<InjectedValue>,
}

impl Injected {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fixture name supplying position `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|v| v.fixture.as_str())
    }

    /// Borrow the value at `index` as a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T> {
        let slot = self
            .values
            .get(index)
            .ok_or(HypoError::InjectedOutOfRange {
                index,
                len: self.values.len(),
            })?;
        slot.value
            .downcast_ref::<T>()
            .ok_or_else(|| HypoError::InjectedType {
                index,
                fixture: slot.fixture.clone(),
                expected: type_name::<T>(),
            })
    }
}
