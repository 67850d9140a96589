pub mod driver;
pub mod runner;
pub mod utils;

// Re-export common items
pub use runner::{run_tests, RunSummary, TestResult};
pub use utils::config::Config;
