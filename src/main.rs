//! `dmg-install`: install the application inside a disk image from the terminal.

use clap::Parser;
use dmg_installer::{
    AutoGate, Collaborators, ConfirmationGate, FeedbackMode, InstallerOptions, Notifier,
    Orchestrator, Outcome, Preferences, ProgressReporter, ReplaceDecision, ReplacePrompt,
    SystemWorkspace, Workspace,
};
use futures::future::BoxFuture;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::{Command, ExitCode, Stdio};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dmg-install", version, about = "Install the application inside a disk image")]
struct Cli {
    /// Disk image to install from
    image: PathBuf,

    /// How to report progress
    #[arg(
        long,
        value_name = "MODE",
        default_value_t = FeedbackMode::Progress,
        env = "DMG_INSTALL_FEEDBACK"
    )]
    feedback: FeedbackMode,

    /// Move the disk image to the trash after a successful install
    #[arg(long)]
    trash: bool,

    /// Reveal the installed application in Finder
    #[arg(long)]
    reveal: bool,

    /// Replace an existing installation without asking
    #[arg(short = 'y', long, visible_alias = "yes", conflicts_with = "skip_existing")]
    replace: bool,

    /// Keep an existing installation without asking
    #[arg(long)]
    skip_existing: bool,

    /// Install somewhere other than /Applications
    #[arg(long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Terminal progress bar.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        let template = "[{bar:40.cyan/blue}] {percent:>3}% {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    fn set(&self, message: &str, fraction: f64) {
        self.bar.set_message(message.to_string());
        self.bar.set_position((fraction * 100.0).round() as u64);
    }
}

impl ProgressReporter for BarReporter {
    fn show(&self, message: &str, fraction: f64) {
        self.set(message, fraction);
    }

    fn update(&self, message: &str, fraction: f64) {
        self.set(message, fraction);
    }

    fn hide(&self) {
        self.bar.finish_and_clear();
    }
}

/// Posts notifications through `osascript`.
struct OsascriptNotifier;

impl Notifier for OsascriptNotifier {
    fn notify(&self, title: &str, message: &str) {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(message),
            escape_applescript(title)
        );
        let spawned = Command::new("osascript")
            .args(["-e", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not post notification");
        }
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Asks on the terminal.
struct PromptGate;

impl ConfirmationGate for PromptGate {
    fn ask_replace_or_skip<'a>(
        &'a self,
        prompt: &'a ReplacePrompt,
    ) -> BoxFuture<'a, ReplaceDecision> {
        let question = match (&prompt.installed_version, &prompt.incoming_version) {
            (Some(installed), Some(incoming)) => format!(
                "{} {} is already installed. Replace it with {}?",
                prompt.bundle_name, installed, incoming
            ),
            _ => format!("{} is already installed. Replace it?", prompt.bundle_name),
        };
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                inquire::Confirm::new(&question).with_default(false).prompt()
            })
            .await;
            match answer {
                Ok(Ok(true)) => ReplaceDecision::Replace,
                Ok(Ok(false)) => ReplaceDecision::Skip,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "prompt failed, keeping existing installation");
                    ReplaceDecision::Skip
                }
                Err(e) => {
                    tracing::warn!(error = %e, "prompt task failed, keeping existing installation");
                    ReplaceDecision::Skip
                }
            }
        })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dmg_installer={level},dmg_install={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.image.is_file() {
        eprintln!("error: {} is not a file", cli.image.display());
        return ExitCode::FAILURE;
    }

    let mut options = InstallerOptions::default();
    if let Some(destination) = cli.destination {
        options.destination = destination;
    }

    let gate: Arc<dyn ConfirmationGate> = if cli.replace {
        Arc::new(AutoGate(ReplaceDecision::Replace))
    } else if cli.skip_existing {
        Arc::new(AutoGate(ReplaceDecision::Skip))
    } else {
        Arc::new(PromptGate)
    };
    let workspace = Arc::new(SystemWorkspace::default());
    let collaborators = Collaborators {
        reporter: Arc::new(BarReporter::new()),
        notifier: Arc::new(OsascriptNotifier),
        gate,
        preferences: Arc::new(Preferences {
            feedback_mode: cli.feedback,
            auto_trash: cli.trash,
            reveal_after_install: cli.reveal,
        }),
        workspace: workspace.clone(),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(options, collaborators);

    let report = match orchestrator.install(&cli.image).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}\n  fix: {}", e, e.fix_suggestion());
            return ExitCode::FAILURE;
        }
    };

    match report.outcome {
        Outcome::Success { bundle, path, skipped } => {
            if cli.feedback != FeedbackMode::Silent {
                if skipped {
                    println!("Kept existing {}", path.display());
                } else {
                    println!("Installed {} to {}", bundle, path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Outcome::ManualFallback { reason, fix } => {
            eprintln!("{}\n  {}", reason, fix);
            for candidate in &report.candidates {
                if let Some(name) = candidate.file_name() {
                    eprintln!("  found: {}", name.to_string_lossy());
                }
            }
            workspace.open(&report.image);
            ExitCode::from(2)
        }
        Outcome::Error { message, fix } => {
            eprintln!("error: {}\n  fix: {}", message, fix);
            ExitCode::FAILURE
        }
    }
}
