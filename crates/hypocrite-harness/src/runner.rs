//! Sequential test execution engine.
//!
//! Each test walks `Init → FixturesUp → Running → FixturesDown → MocksClean
//! → Reported`. Teardown and mock cleanup run whatever happened before
//! them. A FATAL raised anywhere in a test stops the run once that test has
//! been reported. A defect returned by a test body (bad ledger index, wrong
//! arity, ...) aborts the run on the spot.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use hypocrite_core::{
    ArgValue, Fixture, FixtureRun, FixtureUse, HypoError, Injected, MockHandle, MockRegistry,
    MockSignature, TestContext,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunConfig;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("test {test} aborted the run: {source}")]
    Defect {
        test: String,
        #[source]
        source: HypoError,
    },
}

/// Per-test lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Init,
    FixturesUp,
    Running,
    FixturesDown,
    MocksClean,
    Reported,
}

pub type TestBody =
    Box<dyn Fn(&mut TestContext, &Injected) -> Result<(), HypoError> + Send + Sync>;

/// A registered test: its body and ordered fixture list.
pub struct TestCase {
    name: String,
    fixtures: Vec<FixtureUse>,
    body: TestBody,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut TestContext, &Injected) -> Result<(), HypoError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fixtures: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Use a fixture without injecting its value.
    #[must_use]
    pub fn uses(mut self, fixture: &Arc<Fixture>) -> Self {
        self.fixtures.push(FixtureUse::plain(fixture));
        self
    }

    /// Use a fixture and pass its value to the body.
    #[must_use]
    pub fn injects(mut self, fixture: &Arc<Fixture>) -> Self {
        self.fixtures.push(FixtureUse::inject(fixture));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fixtures(&self) -> &[FixtureUse] {
        &self.fixtures
    }
}

/// Tests declared in one test file, with the mocks they share.
pub struct TestSuite {
    file: String,
    registry: MockRegistry,
    tests: Vec<TestCase>,
}

impl TestSuite {
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            registry: MockRegistry::new(),
            tests: Vec::new(),
        }
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Declare a mock in this suite's registry.
    pub fn mock(
        &mut self,
        signature: MockSignature,
        real: impl Fn(&[ArgValue]) -> ArgValue + Send + Sync + 'static,
    ) -> Result<MockHandle, HypoError> {
        self.registry.declare(signature, real)
    }

    #[must_use]
    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    pub fn add_test(&mut self, case: TestCase) -> &mut Self {
        self.tests.push(case);
        self
    }

    #[must_use]
    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub name: String,
    pub verdict: Verdict,
    /// FATAL was raised during this test.
    pub fatal: bool,
    pub diagnostics: Vec<String>,
    /// Fixtures torn down, in teardown order.
    pub torn_down: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub file: String,
    pub declared: usize,
    pub skipped: usize,
    pub outcomes: Vec<TestOutcome>,
    /// The run stopped early because a test raised FATAL.
    pub aborted: bool,
}

impl RunSummary {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Pass)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted() - self.passed()
    }

    /// 0 when everything passed, 1 on any failure, 2 when FATAL cut the run short.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.aborted {
            2
        } else if self.failed() > 0 {
            1
        } else {
            0
        }
    }
}

/// Runs a [`TestSuite`] test by test, streaming one line per test.
pub struct TestRunner {
    config: RunConfig,
    out: Box<dyn Write + Send>,
    log: LogEmitter,
}

impl TestRunner {
    /// Runner writing to stdout with no trace log.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let log = LogEmitter::sink(&config.run_id);
        Self {
            config,
            out: Box::new(std::io::stdout()),
            log,
        }
    }

    /// Runner writing to stdout, with the trace log the config asks for.
    pub fn from_config(config: RunConfig) -> Result<Self, RunError> {
        let log = match &config.log_path {
            Some(path) => LogEmitter::to_file(path, &config.run_id)?,
            None => LogEmitter::sink(&config.run_id),
        };
        Ok(Self::new(config).with_log(log))
    }

    #[must_use]
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = log;
        self
    }

    /// Run every selected test in declaration order until done or FATAL.
    ///
    /// Mocks start the run in spy mode with empty ledgers, and are reset again
    /// when a defect or I/O error aborts it. Fixture teardown is skipped on abort.
    pub fn run(&mut self, suite: &TestSuite) -> Result<RunSummary, RunError> {
        suite.registry().cleanup_all();
        let result = self.run_suite(suite);
        if result.is_err() {
            suite.registry().cleanup_all();
        }
        result
    }

    fn run_suite(&mut self, suite: &TestSuite) -> Result<RunSummary, RunError> {
        let mut ctx = TestContext::new(suite.file());
        let mut summary = RunSummary {
            file: suite.file().to_string(),
            declared: suite.tests().len(),
            skipped: 0,
            outcomes: Vec::new(),
            aborted: false,
        };
        let mocks: Vec<&str> = suite.registry().names().collect();
        self.log.emit_entry(
            LogEntry::new("", LogLevel::Info, "run_start")
                .with_suite(suite.file())
                .with_details(serde_json::json!({
                    "declared": summary.declared,
                    "mocks": mocks,
                    "filter": self.config.filter,
                })),
        )?;

        for case in suite.tests() {
            if !self.config.selects(case.name()) {
                summary.skipped += 1;
                self.log.emit_entry(
                    LogEntry::new("", LogLevel::Debug, "test_skipped")
                        .with_suite(suite.file())
                        .with_test(case.name())
                        .with_outcome(Outcome::Skip),
                )?;
                continue;
            }

            let outcome = self.run_test(&mut ctx, suite, case)?;
            summary.outcomes.push(outcome);

            if ctx.fatal_raised() {
                summary.aborted = true;
                break;
            }
        }

        let outcome = if summary.aborted {
            Outcome::Abort
        } else if summary.failed() > 0 {
            Outcome::Fail
        } else {
            Outcome::Pass
        };
        self.log.emit_entry(
            LogEntry::new("", LogLevel::Info, "run_end")
                .with_suite(suite.file())
                .with_outcome(outcome)
                .with_details(serde_json::json!({
                    "declared": summary.declared,
                    "attempted": summary.attempted(),
                    "passed": summary.passed(),
                    "failed": summary.failed(),
                    "skipped": summary.skipped,
                })),
        )?;
        self.log.flush()?;
        self.out.flush()?;
        Ok(summary)
    }

    fn phase(&mut self, ctx: &TestContext, phase: TestPhase) -> std::io::Result<()> {
        self.log.emit_entry(
            LogEntry::new("", LogLevel::Debug, "phase")
                .with_suite(ctx.file())
                .with_test(ctx.test())
                .with_phase(phase),
        )?;
        Ok(())
    }

    fn run_test(
        &mut self,
        ctx: &mut TestContext,
        suite: &TestSuite,
        case: &TestCase,
    ) -> Result<TestOutcome, RunError> {
        let started = Instant::now();

        ctx.begin_test(case.name());
        self.phase(ctx, TestPhase::Init)?;
        write!(self.out, "{}::{}... ", ctx.file(), ctx.test())?;
        self.out.flush()?;

        self.phase(ctx, TestPhase::FixturesUp)?;
        let mut fixtures = FixtureRun::new(case.fixtures());
        let setup = fixtures.run_setup(ctx);
        for name in fixtures.completed() {
            self.log.emit_entry(
                LogEntry::new("", LogLevel::Debug, "fixture_setup")
                    .with_suite(ctx.file())
                    .with_test(ctx.test())
                    .with_phase(TestPhase::FixturesUp)
                    .with_fixture(name),
            )?;
        }

        match setup {
            Ok(()) => {
                self.phase(ctx, TestPhase::Running)?;
                let injected = fixtures.injected();
                if let Err(source) = (case.body)(ctx, &injected) {
                    self.log.emit_entry(
                        LogEntry::new("", LogLevel::Fatal, "test_defect")
                            .with_suite(ctx.file())
                            .with_test(ctx.test())
                            .with_phase(TestPhase::Running)
                            .with_outcome(Outcome::Abort)
                            .with_details(serde_json::json!({ "error": source.to_string() })),
                    )?;
                    self.log.flush()?;
                    writeln!(self.out)?;
                    self.out.flush()?;
                    return Err(RunError::Defect {
                        test: case.name().to_string(),
                        source,
                    });
                }
            }
            Err(err) => {
                self.log.emit_entry(
                    LogEntry::new("", LogLevel::Error, "fixture_setup_failed")
                        .with_suite(ctx.file())
                        .with_test(ctx.test())
                        .with_phase(TestPhase::FixturesUp)
                        .with_fixture(err.fixture())
                        .with_details(serde_json::json!({ "error": err.to_string() })),
                )?;
            }
        }

        self.phase(ctx, TestPhase::FixturesDown)?;
        let torn_down = fixtures.run_teardown(ctx);
        for name in &torn_down {
            self.log.emit_entry(
                LogEntry::new("", LogLevel::Debug, "fixture_teardown")
                    .with_suite(ctx.file())
                    .with_test(ctx.test())
                    .with_phase(TestPhase::FixturesDown)
                    .with_fixture(name.clone()),
            )?;
        }

        self.phase(ctx, TestPhase::MocksClean)?;
        suite.registry().cleanup_all();

        let verdict = if ctx.failed() || ctx.fatal_raised() {
            Verdict::Fail
        } else {
            Verdict::Pass
        };
        writeln!(
            self.out,
            "{}",
            match verdict {
                Verdict::Pass => "PASS",
                Verdict::Fail => "FAIL",
            }
        )?;
        self.out.flush()?;

        let fatal = ctx.fatal_raised();
        let test = ctx.test().to_string();
        let diagnostics = ctx.finish_test();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.log.emit_entry(
            LogEntry::new("", LogLevel::Info, "test_end")
                .with_suite(ctx.file())
                .with_test(test.clone())
                .with_phase(TestPhase::Reported)
                .with_outcome(match verdict {
                    Verdict::Pass => Outcome::Pass,
                    Verdict::Fail => Outcome::Fail,
                })
                .with_duration_ms(duration_ms)
                .with_details(serde_json::json!({
                    "fatal": fatal,
                    "diagnostics": diagnostics,
                })),
        )?;

        Ok(TestOutcome {
            name: test,
            verdict,
            fatal,
            diagnostics,
            torn_down,
            duration_ms,
        })
    }
}
