use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use shop_api_tester::{runner, Config, RunSummary};

#[derive(Parser)]
#[command(name = "shop-api-tester")]
#[command(author = "NL Team")]
#[command(version)]
#[command(about = "Sequential integration tests for the storefront REST API", long_about = None)]
struct Cli {
    /// Backend to test (scheme and host, endpoints live under /api/)
    #[arg(long)]
    base_url: Option<String>,

    /// Also exercise ticket detail/reply/status and checkout status endpoints
    #[arg(long, default_value = "false")]
    extended: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(ref url) = cli.base_url {
        config = config.with_base_url(url);
    }
    config.extended = cli.extended;
    let threshold = config.pass_threshold;

    let summary = runner::run_tests(config).await?;

    Ok(exit_code(&summary, threshold))
}

/// Exit 0 only when the success rate is above the threshold
fn exit_code(summary: &RunSummary, threshold: f64) -> ExitCode {
    if summary.passes(threshold) {
        return ExitCode::SUCCESS;
    }

    println!(
        "{} Success rate {:.1}% is not above {:.0}%",
        "✗".red().bold(),
        summary.success_rate,
        threshold
    );
    ExitCode::FAILURE
}
