use crate::engine::ocr::{OcrEngine, TesseractOcr};
use crate::model::{ScanConfig, WizardEvent, WizardStage, DEFAULT_PORTAL_URL};
use crate::orchestrator::{run_controller, UiCommand};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Countdown tick granularity in the Redirecting stage.
const COUNTDOWN_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bescom-scan",
    version,
    about = "Scan a BESCOM bill, extract the 10-digit account ID and open the payment portal"
)]
pub struct Cli {
    /// Bill image to scan (optional in TUI mode; a path can be typed in the
    /// Upload view)
    pub image: Option<PathBuf>,

    /// Print the extraction result as JSON and exit (no TUI, no browser)
    #[arg(long)]
    pub json: bool,

    /// Plain text mode: stream progress to stderr, print the account ID (no TUI)
    #[arg(long)]
    pub text: bool,

    /// OCR language model
    #[arg(long, default_value = "eng")]
    pub lang: String,

    /// Tesseract engine mode (passed as --oem)
    #[arg(long, default_value_t = 1)]
    pub oem: u8,

    /// Tesseract binary to invoke
    #[arg(long, default_value = "tesseract")]
    pub tesseract_cmd: String,

    /// Payment portal URL
    #[arg(long, default_value = DEFAULT_PORTAL_URL)]
    pub portal_url: String,

    /// Copy the account ID to the clipboard before redirecting
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_copy: bool,

    /// Never open a browser at the end of the flow
    #[arg(long)]
    pub no_redirect: bool,

    /// Cosmetic pause after OCR completes
    #[arg(long, default_value = "1s")]
    pub thinking_pause: humantime::Duration,

    /// Delay before a valid ID auto-advances to the portal
    #[arg(long, default_value = "1500ms")]
    pub auto_advance_delay: humantime::Duration,

    /// Countdown shown before the browser opens
    #[arg(long, default_value = "3s")]
    pub redirect_countdown: humantime::Duration,
}

/// Build a `ScanConfig` from CLI arguments. `--json` implies no navigation.
pub fn build_config(args: &Cli) -> ScanConfig {
    ScanConfig {
        portal_url: args.portal_url.clone(),
        ocr_lang: args.lang.clone(),
        ocr_engine_mode: args.oem,
        tesseract_cmd: args.tesseract_cmd.clone(),
        auto_copy: args.auto_copy,
        no_redirect: args.no_redirect || args.json,
        thinking_pause: Duration::from(args.thinking_pause),
        auto_advance_delay: Duration::from(args.auto_advance_delay),
        redirect_countdown: Duration::from(args.redirect_countdown),
        countdown_tick: COUNTDOWN_TICK,
    }
}

/// One fresh OCR engine per scan, matching the worker lifecycle of the
/// capability contract.
pub fn ocr_factory(cfg: &ScanConfig) -> impl FnMut() -> Result<Box<dyn OcrEngine>> + Send + 'static {
    let cfg = cfg.clone();
    move || Ok(Box::new(TesseractOcr::new(&cfg)?) as Box<dyn OcrEngine>)
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        bail!("--json and --text are mutually exclusive");
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            init_logging();
            return run_headless(Cli { text: true, ..args }).await;
        }
    }

    init_logging();
    run_headless(args).await
}

#[derive(Serialize)]
struct HeadlessOutcome<'a> {
    account_id: &'a str,
    valid: bool,
    portal_url: &'a str,
}

/// Drive the wizard non-interactively: one scan, no manual correction.
async fn run_headless(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let image = args
        .image
        .clone()
        .context("an image path is required with --text/--json")?;
    let verbose = args.text;

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<WizardEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let factory = ocr_factory(&cfg);
    let controller = tokio::spawn(run_controller(cfg.clone(), factory, evt_tx, cmd_rx));
    cmd_tx
        .send(UiCommand::FileSelected(image))
        .map_err(|_| anyhow::anyhow!("controller stopped before the scan started"))?;

    let mut account_id = String::new();
    let mut valid = false;
    let mut failure: Option<String> = None;

    while let Some(ev) = evt_rx.recv().await {
        match ev {
            WizardEvent::StageChanged(stage) => {
                if verbose {
                    eprintln!("== {} ==", stage.title());
                }
                // Without a human to correct the field, an invalid result in
                // Confirmation ends the run.
                if stage == WizardStage::Confirmation && !valid {
                    let _ = cmd_tx.send(UiCommand::Quit);
                }
            }
            WizardEvent::ScanProgress { percent, phase } => {
                if verbose {
                    eprintln!("[{percent:>3}%] {}", phase.label());
                }
            }
            WizardEvent::IdUpdated {
                value,
                valid: is_valid,
            } => {
                account_id = value;
                valid = is_valid;
            }
            WizardEvent::Alert(msg) => {
                failure = Some(msg);
                let _ = cmd_tx.send(UiCommand::Quit);
            }
            WizardEvent::Notice(msg) => {
                if verbose {
                    eprintln!("{msg}");
                }
            }
            WizardEvent::CountdownTick { remaining } => {
                if verbose {
                    eprintln!("Opening portal in {:.1}s", remaining.as_secs_f64());
                }
            }
            WizardEvent::Navigated { url } => {
                if verbose {
                    eprintln!("Portal: {url}");
                }
            }
            WizardEvent::Copied => {}
        }
    }

    controller
        .await
        .context("wizard controller task failed")??;

    if args.json {
        let out = HeadlessOutcome {
            account_id: &account_id,
            valid,
            portal_url: &cfg.portal_url,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(msg) = failure {
        bail!(msg);
    }
    if !valid {
        bail!("no valid 10-digit account ID found; run interactively to enter one by hand");
    }
    println!("{account_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_never_navigates() {
        let args = Cli::parse_from(["bescom-scan", "--json", "bill.png"]);
        let cfg = build_config(&args);
        assert!(cfg.no_redirect);
    }

    #[test]
    fn delays_are_overridable_for_tests() {
        let args = Cli::parse_from([
            "bescom-scan",
            "--thinking-pause",
            "0s",
            "--auto-advance-delay",
            "0s",
            "--redirect-countdown",
            "0s",
            "bill.png",
        ]);
        let cfg = build_config(&args);
        assert!(cfg.thinking_pause.is_zero());
        assert!(cfg.auto_advance_delay.is_zero());
        assert!(cfg.redirect_countdown.is_zero());
    }

    #[test]
    fn defaults_match_the_portal_flow() {
        let args = Cli::parse_from(["bescom-scan"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.portal_url, DEFAULT_PORTAL_URL);
        assert_eq!(cfg.ocr_lang, "eng");
        assert_eq!(cfg.ocr_engine_mode, 1);
        assert!(cfg.auto_copy);
        assert!(!cfg.no_redirect);
        assert_eq!(cfg.thinking_pause, Duration::from_secs(1));
        assert_eq!(cfg.auto_advance_delay, Duration::from_millis(1500));
        assert_eq!(cfg.redirect_countdown, Duration::from_secs(3));
    }
}
