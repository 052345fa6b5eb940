//! Integration test: per-test lifecycle of the runner.
//!
//! Covers fixture ordering and injection, teardown after failures, FATAL
//! stopping the run and defects aborting it.
//!
//! Run: cargo test -p hypocrite-harness --test runner_lifecycle_test

use std::sync::Arc;

use hypocrite_core::{
    ArgType, ArgValue, ExpectedCall, Fixture, HypoError, MockMode, MockSignature,
};
use hypocrite_harness::structured_log::{LogBuffer, validate_log_line};
use hypocrite_harness::{
    LogEmitter, RunConfig, RunError, TestCase, TestRunner, TestSuite, Verdict,
};
use parking_lot::Mutex;

type Journal = Arc<Mutex<Vec<String>>>;

fn harness() -> (TestRunner, LogBuffer, LogBuffer) {
    let out = LogBuffer::default();
    let (log, buffer) = LogEmitter::to_buffer("lifecycle");
    let runner = TestRunner::new(RunConfig::default().with_run_id("lifecycle"))
        .with_output(Box::new(out.clone()))
        .with_log(log);
    (runner, out, buffer)
}

fn valued(name: &'static str, value: i32, journal: &Journal) -> Arc<Fixture> {
    let up = Arc::clone(journal);
    let down = Arc::clone(journal);
    Fixture::returning(name, move |_ctx| {
        up.lock().push(format!("setup {name}"));
        Ok(value)
    })
    .teardown(move |_ctx, v: i32| down.lock().push(format!("teardown {name}={v}")))
    .build()
}

fn plain(name: &'static str, journal: &Journal) -> Arc<Fixture> {
    let up = Arc::clone(journal);
    let down = Arc::clone(journal);
    Fixture::unit(name, move |_ctx| {
        up.lock().push(format!("setup {name}"));
        Ok(())
    })
    .teardown(move |_ctx, ()| down.lock().push(format!("teardown {name}")))
    .build()
}

#[test]
fn fixtures_inject_in_order_and_tear_down_in_setup_order() {
    let journal: Journal = Arc::default();
    let a = valued("a", 1, &journal);
    let b = plain("b", &journal);
    let c = valued("c", 2, &journal);

    let seen = Arc::clone(&journal);
    let mut suite = TestSuite::new("t_fixtures.c");
    suite.add_test(
        TestCase::new("injects_a_then_c", move |ctx, fx| {
            let first = *fx.get::<i32>(0)?;
            let second = *fx.get::<i32>(1)?;
            seen.lock().push(format!("body {first} {second}"));
            ctx.check(fx.len() == 2, "b must not be injected");
            Ok(())
        })
        .injects(&a)
        .uses(&b)
        .injects(&c),
    );

    let (mut runner, out, _) = harness();
    let summary = runner.run(&suite).unwrap();
    assert_eq!(out.contents(), "t_fixtures.c::injects_a_then_c... PASS\n");
    assert_eq!(
        *journal.lock(),
        vec![
            "setup a",
            "setup b",
            "setup c",
            "body 1 2",
            "teardown a=1",
            "teardown b",
            "teardown c=2",
        ]
    );
    assert_eq!(summary.outcomes[0].torn_down, vec!["a", "b", "c"]);
}

#[test]
fn teardown_and_cleanup_follow_a_failing_body() {
    let journal: Journal = Arc::default();
    let fx = plain("scratch", &journal);
    let mut suite = TestSuite::new("t_fail.c");
    let foo = suite
        .mock(
            MockSignature::new("foo").arg("x", ArgType::Int).returns(ArgType::Int),
            |_| ArgValue::Int(0),
        )
        .unwrap();
    let inner = foo.clone();
    suite.add_test(
        TestCase::new("expects_wrong_argument", move |ctx, _| {
            inner.set_strict();
            inner.invoke(vec![1.into()])?;
            inner.check_calls(ctx, &[ExpectedCall::new().arg(2)]);
            Ok(())
        })
        .uses(&fx),
    );

    let (mut runner, out, _) = harness();
    let summary = runner.run(&suite).unwrap();
    assert_eq!(out.contents(), "t_fail.c::expects_wrong_argument... FAIL\n");
    assert_eq!(*journal.lock(), vec!["setup scratch", "teardown scratch"]);
    assert_eq!(summary.outcomes[0].verdict, Verdict::Fail);
    assert!(!summary.outcomes[0].fatal);
    assert!(summary.outcomes[0].diagnostics[0].starts_with("foo: "));
    assert_eq!(foo.call_count(), 0);
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn fatal_in_test_k_leaves_later_tests_unstarted() {
    const N: usize = 6;
    const K: usize = 2;

    let journal: Journal = Arc::default();
    let fx = plain("fx", &journal);
    let mut suite = TestSuite::new("t_fatal.c");
    let tick = suite
        .mock(MockSignature::new("tick"), |_| ArgValue::Void)
        .unwrap();

    for i in 0..N {
        let seen = Arc::clone(&journal);
        let tick = tick.clone();
        suite.add_test(
            TestCase::new(format!("case_{i}"), move |ctx, _| {
                seen.lock().push(format!("body {i}"));
                tick.invoke(Vec::new())?;
                if i == K {
                    ctx.fatal("cannot continue");
                }
                Ok(())
            })
            .uses(&fx),
        );
    }

    let (mut runner, out, _) = harness();
    let summary = runner.run(&suite).unwrap();

    let expected: String = (0..=K)
        .map(|i| {
            let verdict = if i == K { "FAIL" } else { "PASS" };
            format!("t_fatal.c::case_{i}... {verdict}\n")
        })
        .collect();
    assert_eq!(out.contents(), expected);
    assert!(summary.aborted);
    assert_eq!(summary.attempted(), K + 1);
    assert_eq!(summary.declared, N);
    assert_eq!(summary.exit_code(), 2);

    let journal = journal.lock();
    assert!(!journal.iter().any(|e| e == &format!("body {}", K + 1)));
    assert_eq!(journal.last().map(String::as_str), Some("teardown fx"));
    assert_eq!(tick.call_count(), 0, "mocks cleaned after the FATAL test");
}

#[test]
fn failing_fixture_setup_is_fatal_and_skips_the_body() {
    let journal: Journal = Arc::default();
    let ok = plain("ok", &journal);
    let broken = Fixture::returning("broken", |_ctx| Err::<i32, _>("no disk".to_string())).build();
    let never = plain("never", &journal);

    let mut suite = TestSuite::new("t_setup.c");
    suite
        .add_test(
            TestCase::new("needs_disk", |_, _| panic!("body must not run"))
                .uses(&ok)
                .uses(&broken)
                .uses(&never),
        )
        .add_test(TestCase::new("after", |_, _| panic!("must not start")));

    let (mut runner, out, log) = harness();
    let summary = runner.run(&suite).unwrap();
    assert_eq!(out.contents(), "t_setup.c::needs_disk... FAIL\n");
    assert_eq!(*journal.lock(), vec!["setup ok", "teardown ok"]);
    assert!(summary.outcomes[0].fatal);
    assert!(summary.aborted);
    assert!(log.contents().contains("fixture_setup_failed"));
}

#[test]
fn defect_aborts_without_report_line() {
    let mut suite = TestSuite::new("t_defect.c");
    let foo = suite
        .mock(
            MockSignature::new("foo").arg("x", ArgType::Int),
            |_| ArgValue::Void,
        )
        .unwrap();
    let inner = foo.clone();
    suite
        .add_test(TestCase::new("fine", |_, _| Ok(())))
        .add_test(TestCase::new("reads_past_ledger", move |_, _| {
            inner.invoke(vec![1.into()])?;
            inner.get_arg(1, "x")?;
            Ok(())
        }))
        .add_test(TestCase::new("unreached", |_, _| panic!("must not start")));

    let (mut runner, out, _) = harness();
    match runner.run(&suite) {
        Err(RunError::Defect { test, source }) => {
            assert_eq!(test, "reads_past_ledger");
            assert!(matches!(
                source,
                HypoError::OutOfRange { index: 1, len: 1, .. }
            ));
        }
        other => panic!("expected defect, got {other:?}"),
    }
    assert_eq!(
        out.contents(),
        "t_defect.c::fine... PASS\nt_defect.c::reads_past_ledger... \n"
    );
}

#[test]
fn suite_reruns_cleanly_after_defect() {
    let mut suite = TestSuite::new("t_rerun.c");
    let len = suite
        .mock(
            MockSignature::new("len").arg("s", ArgType::Str).returns(ArgType::Int),
            |args| ArgValue::Int(args[0].as_str().map_or(0, |s| s.len() as i64)),
        )
        .unwrap();
    let fresh = len.clone();
    let strict = len.clone();
    suite
        .add_test(TestCase::new("sees_fresh_mock", move |ctx, _| {
            ctx.check(fresh.mode() == MockMode::Spy, "mock left strict");
            ctx.check(fresh.call_count() == 0, "ledger not empty");
            Ok(())
        }))
        .add_test(TestCase::new("strict_then_defect", move |_, _| {
            strict.set_strict();
            strict.set_stub(-1)?;
            strict.invoke(vec!["abc".into()])?;
            strict.get_file(3)?;
            Ok(())
        }));

    let (mut runner, _, _) = harness();
    assert!(matches!(runner.run(&suite), Err(RunError::Defect { .. })));
    assert_eq!(len.mode(), MockMode::Spy);
    assert_eq!(len.call_count(), 0);

    let (mut again, out, _) = harness();
    let summary = again.run(&suite);
    assert!(matches!(summary, Err(RunError::Defect { .. })));
    assert!(out.contents().starts_with("t_rerun.c::sees_fresh_mock... PASS\n"));
}

#[test]
fn every_emitted_log_line_validates() {
    let journal: Journal = Arc::default();
    let fx = valued("v", 7, &journal);
    let mut suite = TestSuite::new("t_log.c");
    suite
        .add_test(TestCase::new("one", |_, _| Ok(())).injects(&fx))
        .add_test(TestCase::new("two", |ctx, _| {
            ctx.fail("nope");
            Ok(())
        }))
        .add_test(TestCase::new("skipped_by_filter", |_, _| Ok(())));

    let out = LogBuffer::default();
    let (log, buffer) = LogEmitter::to_buffer("validate");
    let mut runner = TestRunner::new(RunConfig::default().with_filter("o"))
        .with_output(Box::new(out))
        .with_log(log);
    let summary = runner.run(&suite).unwrap();
    assert_eq!(summary.skipped, 1);

    let contents = buffer.contents();
    let mut events = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        let entry = validate_log_line(line, i + 1)
            .unwrap_or_else(|errs| panic!("line {} invalid: {errs:?}", i + 1));
        assert!(entry.trace_id.starts_with("hypocrite::validate::"));
        events.push(entry.event);
    }
    assert_eq!(events.first().map(String::as_str), Some("run_start"));
    assert_eq!(events.last().map(String::as_str), Some("run_end"));
    assert_eq!(events.iter().filter(|e| *e == "test_end").count(), 2);
    assert_eq!(events.iter().filter(|e| *e == "test_skipped").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "fixture_teardown").count(), 1);
}
