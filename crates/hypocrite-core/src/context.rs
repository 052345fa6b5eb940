//! Run-wide test context shared with test bodies, fixtures and assertion helpers.

/// Current file/test identity plus the FAIL and FATAL flags.
///
/// FAIL is per test and cleared by [`TestContext::finish_test`]. FATAL is
/// sticky for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    file: String,
    test: String,
    fail: bool,
    fatal: bool,
    diagnostics: Vec<String>,
}

impl TestContext {
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn test(&self) -> &str {
        &self.test
    }

    pub fn begin_test(&mut self, name: impl Into<String>) {
        self.test = name.into();
        self.diagnostics.clear();
    }

    /// Record an assertion failure. The test continues.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.fail = true;
        self.diagnostics.push(message.into());
    }

    /// Record a fatal failure: the current test fails and no further tests run.
    pub fn fatal(&mut self, message: impl Into<String>) {
        self.fail = true;
        self.fatal = true;
        self.diagnostics.push(message.into());
    }

    /// Fail unless `cond` holds. Returns `cond`.
    pub fn check(&mut self, cond: bool, message: impl Into<String>) -> bool {
        if !cond {
            self.fail(message);
        }
        cond
    }

    /// Raise FATAL unless `cond` holds. Returns `cond`.
    pub fn check_fatal(&mut self, cond: bool, message: impl Into<String>) -> bool {
        if !cond {
            self.fatal(message);
        }
        cond
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.fail
    }

    #[must_use]
    pub fn fatal_raised(&self) -> bool {
        self.fatal
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Clear FAIL and hand back the diagnostics collected for the test.
    pub fn finish_test(&mut self) -> Vec<String> {
        self.fail = false;
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_is_cleared_but_fatal_is_sticky() {
        let mut ctx = TestContext::new("t_unit.c");
        ctx.begin_test("first");
        ctx.fatal("boom");
        assert!(ctx.failed());
        assert!(ctx.fatal_raised());

        let diags = ctx.finish_test();
        assert_eq!(diags, vec!["boom".to_string()]);
        assert!(!ctx.failed());
        assert!(ctx.fatal_raised());
    }

    #[test]
    fn check_only_flags_on_false() {
        let mut ctx = TestContext::new("t_unit.c");
        ctx.begin_test("check");
        assert!(ctx.check(true, "never"));
        assert!(!ctx.failed());
        assert!(!ctx.check(false, "x != y"));
        assert!(ctx.failed());
        assert!(!ctx.fatal_raised());
        assert_eq!(ctx.diagnostics(), ["x != y".to_string()]);
    }

    #[test]
    fn begin_test_records_identity() {
        let mut ctx = TestContext::new("t_unit.c");
        ctx.begin_test("alpha");
        assert_eq!(ctx.file(), "t_unit.c");
        assert_eq!(ctx.test(), "alpha");
    }
}
