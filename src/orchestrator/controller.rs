//! Wizard controller.
//!
//! Owns the `WizardState`, drives stage transitions and the redirection flow,
//! and supervises the single in-flight scan task. The step controller is
//! purely reactive: extraction is initiated by `FileSelected`, never by a
//! stage change itself.

use anyhow::Result;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Sleep};

use crate::clipboard;
use crate::engine::ocr::OcrEngine;
use crate::engine::ScanEngine;
use crate::extract;
use crate::model::{ScanConfig, ScanOutcome, WizardEvent, WizardStage, WizardState};
use crate::navigate;

/// Commands emitted by UI layers to drive the wizard.
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// A bill image was chosen. An empty path is a no-op.
    FileSelected(PathBuf),
    /// The identifier field was edited by hand.
    IdEdited(String),
    /// Confirm button: start the redirection flow.
    Proceed,
    /// Copy the identifier to the clipboard.
    CopyId,
    /// Back to Upload; clears the identifier and the image reference and
    /// aborts any in-flight scan.
    Reset,
    Quit,
}

/// Handle for the single in-flight scan task.
struct ScanCtx {
    handle: Option<tokio::task::JoinHandle<Result<ScanOutcome>>>,
}

/// Show exactly one stage. Imposes no transition guard and is idempotent;
/// indicator marks are derived from the stage by the presentation layer.
fn set_stage(state: &mut WizardState, stage: WizardStage, event_tx: &UnboundedSender<WizardEvent>) {
    state.stage = stage;
    let _ = event_tx.send(WizardEvent::StageChanged(stage));
}

/// Write a new identifier value and synchronously recompute validity.
fn set_account_id(
    state: &mut WizardState,
    value: String,
    event_tx: &UnboundedSender<WizardEvent>,
) -> bool {
    state.account_id = value;
    let valid = extract::is_valid_account_id(&state.account_id);
    let _ = event_tx.send(WizardEvent::IdUpdated {
        value: state.account_id.clone(),
        valid,
    });
    valid
}

/// Run the wizard until the user quits or the portal redirect fires.
///
/// `make_ocr` builds a fresh OCR engine per scan, mirroring the one-worker-
/// per-recognition lifecycle of the capability contract.
pub async fn run_controller<F>(
    cfg: ScanConfig,
    mut make_ocr: F,
    event_tx: UnboundedSender<WizardEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()>
where
    F: FnMut() -> Result<Box<dyn OcrEngine>> + Send,
{
    let mut state = WizardState::default();
    set_stage(&mut state, WizardStage::Upload, &event_tx);

    let mut scan: Option<ScanCtx> = None;
    let mut auto_advance: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::FileSelected(path)) => {
                        if path.as_os_str().is_empty() {
                            // No file selected: silently ignored, no stage change.
                        } else if scan.is_some() {
                            let _ = event_tx.send(WizardEvent::Notice(
                                "A scan is already in progress".into(),
                            ));
                        } else {
                            state.image = Some(path.clone());
                            auto_advance = None;
                            set_stage(&mut state, WizardStage::Scanning, &event_tx);
                            match make_ocr() {
                                Ok(ocr) => {
                                    let engine = ScanEngine::new(cfg.clone(), ocr);
                                    let tx = event_tx.clone();
                                    scan = Some(ScanCtx {
                                        handle: Some(tokio::spawn(engine.run(path, tx))),
                                    });
                                }
                                Err(e) => {
                                    let _ = event_tx.send(WizardEvent::Alert(format!(
                                        "AI scanning unavailable: {e:#}"
                                    )));
                                    state.image = None;
                                    set_stage(&mut state, WizardStage::Upload, &event_tx);
                                }
                            }
                        }
                    }
                    Some(UiCommand::IdEdited(value)) => {
                        // Edits only refresh validity feedback; the stage is untouched.
                        set_account_id(&mut state, value, &event_tx);
                    }
                    Some(UiCommand::Proceed) => {
                        auto_advance = None;
                        if run_redirection(&cfg, &mut state, &event_tx).await? {
                            break Ok(());
                        }
                    }
                    Some(UiCommand::CopyId) => {
                        let id = state.account_id.trim().to_string();
                        if !id.is_empty() {
                            match clipboard::copy_to_clipboard(&id) {
                                Ok(()) => {
                                    let _ = event_tx.send(WizardEvent::Copied);
                                }
                                Err(e) => tracing::warn!(error = %e, "copy failed"),
                            }
                        }
                    }
                    Some(UiCommand::Reset) => {
                        // Abort any in-flight scan; kill_on_drop reaps the OCR
                        // subprocess with the task.
                        if let Some(mut ctx) = scan.take() {
                            if let Some(h) = ctx.handle.take() {
                                h.abort();
                            }
                        }
                        auto_advance = None;
                        state.image = None;
                        set_account_id(&mut state, String::new(), &event_tx);
                        set_stage(&mut state, WizardStage::Upload, &event_tx);
                    }
                    Some(UiCommand::Quit) | None => break Ok(()),
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped when another branch is chosen and completion is
            // never observed.
            maybe_done = async {
                if let Some(ctx) = &mut scan {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    scan = None;
                    match join_res {
                        Ok(Ok(outcome)) => {
                            let valid =
                                set_account_id(&mut state, outcome.candidate, &event_tx);
                            // Confirmation is entered regardless of validity so the
                            // user can inspect or correct the result.
                            set_stage(&mut state, WizardStage::Confirmation, &event_tx);
                            if valid {
                                let _ = event_tx.send(WizardEvent::Notice(
                                    "Valid account ID detected, advancing to the portal".into(),
                                ));
                                auto_advance =
                                    Some(Box::pin(tokio::time::sleep(cfg.auto_advance_delay)));
                            }
                        }
                        Ok(Err(e)) => {
                            let _ = event_tx.send(WizardEvent::Alert(format!(
                                "AI scanning interrupted: {e:#}. Ensure the image is clear and try again."
                            )));
                            state.image = None;
                            set_stage(&mut state, WizardStage::Upload, &event_tx);
                        }
                        Err(e) => {
                            if !e.is_cancelled() {
                                let _ = event_tx.send(WizardEvent::Alert(format!(
                                    "Scan task failed: {e}"
                                )));
                                state.image = None;
                                set_stage(&mut state, WizardStage::Upload, &event_tx);
                            }
                        }
                    }
                }
            }
            // Auto-advance fires only when armed; the redirect flow re-validates
            // the identifier in case it was edited during the delay.
            () = async {
                match auto_advance.as_mut() {
                    Some(s) => s.as_mut().await,
                    None => futures::future::pending().await,
                }
            } => {
                auto_advance = None;
                if run_redirection(&cfg, &mut state, &event_tx).await? {
                    break Ok(());
                }
            }
        }
    }
}

/// Redirection flow. Returns `Ok(true)` when the portal was opened (the
/// terminal action); `Ok(false)` when the identifier was rejected, leaving the
/// stage unchanged.
async fn run_redirection(
    cfg: &ScanConfig,
    state: &mut WizardState,
    event_tx: &UnboundedSender<WizardEvent>,
) -> Result<bool> {
    let id = state.account_id.trim().to_string();
    if !extract::is_valid_account_id(&id) {
        let _ = event_tx.send(WizardEvent::Alert(
            "Please provide a valid 10-digit BESCOM account ID before proceeding.".into(),
        ));
        return Ok(false);
    }

    // Auto-copy for user convenience; the ID reaches the portal via the
    // clipboard only, never via the URL.
    if cfg.auto_copy {
        if let Err(e) = clipboard::copy_to_clipboard(&id) {
            tracing::warn!(error = %e, "copy before redirect failed");
        }
    }

    set_stage(state, WizardStage::Redirecting, event_tx);

    // Cosmetic countdown. Once started there is no way to abort short of
    // killing the process.
    if cfg.countdown_tick.is_zero() {
        tokio::time::sleep(cfg.redirect_countdown).await;
    } else {
        let deadline = Instant::now() + cfg.redirect_countdown;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let _ = event_tx.send(WizardEvent::CountdownTick {
                remaining: deadline - now,
            });
            let next = std::cmp::min(now + cfg.countdown_tick, deadline);
            tokio::time::sleep_until(next).await;
        }
    }

    if cfg.no_redirect {
        tracing::info!(url = %cfg.portal_url, "redirect suppressed");
    } else if let Err(e) = navigate::open_in_browser(&cfg.portal_url) {
        tracing::warn!(error = %e, "browser launch failed");
        let _ = event_tx.send(WizardEvent::Notice(format!(
            "Could not open a browser; visit {} manually",
            cfg.portal_url
        )));
    }
    let _ = event_tx.send(WizardEvent::Navigated {
        url: cfg.portal_url.clone(),
    });
    Ok(true)
}
