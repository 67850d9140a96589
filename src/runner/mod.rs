pub mod context;
pub mod events;
pub mod executor;
pub mod state;
pub mod suite;

#[cfg(test)]
pub(crate) mod fake;

use anyhow::{Context, Result};

use crate::driver::HttpDriver;
use crate::utils::config::Config;

pub use context::SessionContext;
pub use events::*;
pub use executor::{ApiTester, ResponseBody};
pub use state::*;

/// Run the whole sequence against a live backend and return the aggregate.
///
/// Only failing to build the HTTP client is an error; every test failure is
/// captured in the returned summary.
pub async fn run_tests(config: Config) -> Result<RunSummary> {
    let driver = HttpDriver::new().context("Failed to build HTTP client")?;

    let mut tester = ApiTester::new(Box::new(driver), config);
    suite::run_all(&mut tester).await;

    Ok(tester.finish().await)
}
