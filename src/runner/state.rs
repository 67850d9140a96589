use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of one executed (or skipped) test. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub index: usize,
    pub name: String,
    pub success: bool,
    pub details: String,
    pub timestamp: DateTime<Local>,
}

/// Append-only record of every test in execution order
#[derive(Debug, Clone)]
pub struct ResultLog {
    results: Vec<TestResult>,
    tests_run: u32,
    tests_passed: u32,
    started_at: Instant,
}

impl ResultLog {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            tests_run: 0,
            tests_passed: 0,
            started_at: Instant::now(),
        }
    }

    /// Append a result and bump the counters
    pub fn record(&mut self, name: &str, success: bool, details: String) -> &TestResult {
        self.tests_run += 1;
        if success {
            self.tests_passed += 1;
        }

        let index = self.results.len();
        self.results.push(TestResult {
            index,
            name: name.to_string(),
            success,
            details,
            timestamp: Local::now(),
        });
        &self.results[index]
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn tests_run(&self) -> u32 {
        self.tests_run
    }

    pub fn tests_passed(&self) -> u32 {
        self.tests_passed
    }

    pub fn summary(&self, session_id: &str) -> RunSummary {
        RunSummary {
            session_id: session_id.to_string(),
            total: self.tests_run,
            passed: self.tests_passed,
            failed: self.tests_run - self.tests_passed,
            success_rate: success_rate(self.tests_passed, self.tests_run),
            total_duration_ms: self.started_at.elapsed().as_millis() as u64,
            results: self.results.clone(),
        }
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage of passed tests; zero when nothing ran
pub fn success_rate(passed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    passed as f64 / total as f64 * 100.0
}

/// Aggregate produced once at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub success_rate: f64,
    pub total_duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    /// Strictly above the threshold; a run sitting exactly on it fails
    pub fn passes(&self, threshold: f64) -> bool {
        self.success_rate > threshold
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
