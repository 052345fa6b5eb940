//! Built-in suite exercising the runtime end to end.
//!
//! The unit under test is [`write_all`], a C-style loop over a `write`
//! function reached through a [`CallTarget`]. The suite mocks that
//! `write` and checks spy forwarding, strict stubs, wildcards, call sites
//! and fixture injection. With `demo_failures` it appends a failing test,
//! a test whose fixture setup fails (FATAL) and one that is never reached.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hypocrite_core::{
    ArgType, ArgValue, CallTarget, ExpectedCall, Fixture, HypoError, MockSignature, hypo_call,
};

use crate::runner::{TestCase, TestSuite};

/// File name the built-in suite reports under.
pub const SELFTEST_FILE: &str = "selftest.c";

const DEVICE_FD: i64 = 3;

/// Write all of `buf` to `fd`, retrying short writes.
///
/// Returns the byte count, or -1 as soon as `write` reports zero or an error.
pub fn write_all(write: &dyn CallTarget, fd: i64, buf: &[u8]) -> Result<i64, HypoError> {
    let mut offset = 0usize;
    while offset < buf.len() {
        let rest = &buf[offset..];
        let n = hypo_call!(write, fd, rest, rest.len())?;
        match n.as_int() {
            Some(n) if n > 0 => offset += usize::try_from(n).unwrap_or(usize::MAX).min(rest.len()),
            _ => return Ok(-1),
        }
    }
    Ok(i64::try_from(offset).unwrap_or(i64::MAX))
}

fn write_signature() -> MockSignature {
    MockSignature::new("write")
        .arg("fd", ArgType::Int)
        .arg("buf", ArgType::Bytes)
        .arg("count", ArgType::UInt)
        .returns(ArgType::Int)
}

/// Build the built-in suite.
pub fn suite(demo_failures: bool) -> Result<TestSuite, HypoError> {
    let mut suite = TestSuite::new(SELFTEST_FILE);

    let device_writes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&device_writes);
    let write = suite.mock(write_signature(), move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let count = args[2].as_uint().unwrap_or(0);
        ArgValue::Int(i64::try_from(count).unwrap_or(i64::MAX))
    })?;

    let device = Fixture::returning("device", |_ctx| Ok(DEVICE_FD)).build();
    let payload = Fixture::returning("payload", |_ctx| Ok(b"hello".to_vec())).build();
    let banner = Fixture::unit("banner", |_ctx| Ok(())).build();

    let w = write.clone();
    suite.add_test(
        TestCase::new("spy_forwards_to_real_write", move |ctx, fx| {
            let fd = *fx.get::<i64>(0)?;
            let buf = fx.get::<Vec<u8>>(1)?;
            let n = write_all(&w, fd, buf)?;
            ctx.check(n == 5, format!("write_all returned {n}, expected 5"));
            w.check_calls(
                ctx,
                &[ExpectedCall::new().arg(fd).arg(buf.as_slice()).arg(5usize)],
            );
            Ok(())
        })
        .injects(&device)
        .uses(&banner)
        .injects(&payload),
    );

    let w = write.clone();
    let seen = Arc::clone(&device_writes);
    suite.add_test(TestCase::new("strict_stub_skips_real_write", move |ctx, _| {
        let before = seen.load(Ordering::SeqCst);
        w.set_strict();
        w.set_stub(-1i64)?;
        let n = write_all(&w, DEVICE_FD, b"abc")?;
        ctx.check(n == -1, format!("write_all returned {n}, expected -1"));
        let after = seen.load(Ordering::SeqCst);
        ctx.check(after == before, "real write ran in strict mode");
        ctx.check(w.call_count() == 1, "expected exactly one recorded call");
        Ok(())
    }));

    let w = write.clone();
    suite.add_test(TestCase::new("short_writes_are_retried", move |ctx, _| {
        w.set_strict();
        w.set_stub(2i64)?;
        let n = write_all(&w, DEVICE_FD, b"hello")?;
        ctx.check(n == 5, format!("write_all returned {n}, expected 5"));
        w.check_calls(
            ctx,
            &[
                ExpectedCall::new().arg(DEVICE_FD).any().arg(5usize),
                ExpectedCall::new().arg(DEVICE_FD).any().arg(3usize),
                ExpectedCall::new().arg(DEVICE_FD).any().arg(1usize),
            ],
        );
        let tail = w.get_arg(2, "buf")?;
        ctx.check(
            tail == ArgValue::Bytes(b"o".to_vec()),
            format!("last chunk was {tail}"),
        );
        Ok(())
    }));

    let w = write.clone();
    suite.add_test(TestCase::new("zero_write_reports_error", move |ctx, _| {
        w.set_strict();
        let n = write_all(&w, DEVICE_FD, b"x")?;
        ctx.check(n == -1, format!("write_all returned {n}, expected -1"));
        Ok(())
    }));

    let w = write.clone();
    suite.add_test(TestCase::new("records_call_site", move |ctx, _| {
        write_all(&w, DEVICE_FD, b"z")?;
        let file = w.get_file(0)?;
        ctx.check(file == file!(), format!("call recorded at {file}"));
        ctx.check(w.get_line(0)? > 0, "call line missing");
        Ok(())
    }));

    if demo_failures {
        let w = write.clone();
        suite.add_test(TestCase::new("demo_expectation_mismatch", move |ctx, _| {
            write_all(&w, DEVICE_FD, b"hi")?;
            w.check_calls(
                ctx,
                &[
                    ExpectedCall::new().arg(DEVICE_FD + 1).any().any(),
                    ExpectedCall::new().any().any().any(),
                ],
            );
            Ok(())
        }));

        let offline = Fixture::returning("offline_device", |_ctx| {
            Err::<i64, _>("device not attached".to_string())
        })
        .build();
        suite.add_test(
            TestCase::new("demo_fatal_fixture", |ctx, _| {
                ctx.fail("body ran after failed setup");
                Ok(())
            })
            .uses(&device)
            .uses(&offline),
        );

        suite.add_test(TestCase::new("demo_never_reached", |ctx, _| {
            ctx.fail("ran after FATAL");
            Ok(())
        }));
    }

    Ok(suite)
}
