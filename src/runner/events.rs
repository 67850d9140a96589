use super::state::{RunSummary, TestResult};
use crate::driver::ApiMethod;
use tokio::sync::broadcast;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    SessionStarted {
        session_id: String,
        base_url: String,
    },
    SessionFinished {
        summary: RunSummary,
    },

    /// A request is about to go out
    TestStarted {
        name: String,
        method: ApiMethod,
        path: String,
    },
    /// A result was recorded (network outcome or skipped precondition)
    TestFinished {
        result: TestResult,
    },
}

/// Event emitter for broadcasting test events
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

const RULE_WIDTH: usize = 50;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    /// Print events until every sender is dropped
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("console listener dropped {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match &event {
                TestEvent::TestStarted { name, method, path } => {
                    let pb = if interactive {
                        ProgressBar::new_spinner()
                    } else {
                        // Piped output: no escape codes
                        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
                    };
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("{spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    let label = format!("{} {} /api/{}", name, method, path);
                    pb.set_message(label.dimmed().to_string());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }
                TestEvent::TestFinished { .. } | TestEvent::SessionFinished { .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                }
                TestEvent::SessionStarted { .. } => {}
            }

            for line in Self::render(&event) {
                println!("{}", line);
            }
        }
    }

    /// Lines printed for an event; the in-flight spinner is drawn separately
    pub fn render(event: &TestEvent) -> Vec<String> {
        use colored::Colorize;

        match event {
            TestEvent::SessionStarted {
                session_id,
                base_url,
            } => vec![
                format!(
                    "{} Starting API tests against {}",
                    "🚀".to_string().blue(),
                    base_url.cyan()
                ),
                format!("   Session: {}", session_id.dimmed()),
                "=".repeat(RULE_WIDTH),
            ],

            TestEvent::TestStarted { .. } => Vec::new(),

            TestEvent::TestFinished { result } => {
                let status = if result.success {
                    "✅ PASSED".green().bold()
                } else {
                    "❌ FAILED".red().bold()
                };
                let mut lines = vec![format!("{} - {}", status, result.name)];
                if !result.details.is_empty() {
                    lines.push(format!("   Details: {}", result.details));
                }
                lines
            }

            TestEvent::SessionFinished { summary } => {
                let mut lines = vec![
                    format!("\n{}", "=".repeat(RULE_WIDTH)),
                    format!(
                        "{} Test Results: {}/{} passed",
                        "📊".to_string().blue(),
                        summary.passed.to_string().green(),
                        summary.total
                    ),
                    format!("Success Rate: {:.1}%", summary.success_rate),
                ];
                if summary.failed > 0 {
                    lines.push(format!("  {} failed", summary.failed.to_string().red()));
                }
                lines.push(format!("  Duration: {}ms", summary.total_duration_ms));
                lines
            }
        }
    }
}
