use super::steps::{Expectation, Outcome};
use std::fmt;

/// A step whose outcome differed from its expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// 0 is the connect, 1.. are the scenario's steps.
    pub step: usize,
    pub description: String,
    pub expected: Expectation,
    pub actual: Outcome,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.description, self.expected, self.actual
        )
    }
}

/// Result of running a scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
    pub mismatch: Option<Mismatch>,
}

impl ScenarioResult {
    pub(crate) fn passed(name: &str, steps_executed: usize) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            steps_executed,
            failure_step: None,
            error: None,
            mismatch: None,
        }
    }

    pub(crate) fn mismatched(name: &str, mismatch: Mismatch) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            steps_executed: mismatch.step + 1,
            failure_step: Some(mismatch.step),
            error: Some(mismatch.to_string()),
            mismatch: Some(mismatch),
        }
    }

    pub(crate) fn failed(name: &str, step: usize, error: String) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            steps_executed: step,
            failure_step: Some(step),
            error: Some(error),
            mismatch: None,
        }
    }

    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}

/// Results of every scenario of a suite, in run order.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    pub endpoint: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// Result of the scenario named `name`.
    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Panic with every failure if any scenario failed
    pub fn unwrap(self) {
        if self.all_passed() {
            return;
        }
        let failures: Vec<String> = self
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "  '{}' at step {}: {}",
                    r.name,
                    r.failure_step.unwrap_or(0),
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        panic!(
            "Suite '{}' had {} failing scenario(s):\n{}",
            self.name,
            failures.len(),
            failures.join("\n")
        );
    }
}
