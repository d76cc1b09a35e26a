//! OCR capability boundary.
//!
//! The pipeline depends only on this trait: recognize image bytes into text
//! with progress notifications, then release the engine. The production
//! implementation shells out to the `tesseract` CLI; its internals are opaque
//! to the rest of the crate.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::model::ScanConfig;

/// Coarse status tag attached to every progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrStatus {
    Initializing,
    Recognizing,
}

/// One progress notification from the engine, fraction in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct OcrProgress {
    pub status: OcrStatus,
    pub fraction: f32,
}

pub type ProgressFn = dyn Fn(OcrProgress) + Send + Sync;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine identifier for logs and error messages.
    fn name(&self) -> &'static str;

    /// Recognize the image at `path` into raw text, notifying `progress`
    /// with fractions in [0, 1] along the way.
    async fn recognize(&mut self, path: &Path, progress: &ProgressFn) -> Result<String>;

    /// Release the engine's resources. Must be called after each recognition
    /// regardless of success or failure.
    async fn terminate(&mut self) -> Result<()>;
}

/// How often the subprocess engine emits an estimated progress notification.
const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// Rough wall-clock estimate for one recognition, used only to shape the
/// progress curve. Capped at 95% until the process actually exits.
const RECOGNITION_ESTIMATE: Duration = Duration::from_secs(5);

/// OCR engine backed by the `tesseract` command-line binary.
pub struct TesseractOcr {
    cmd: String,
    lang: String,
    engine_mode: u8,
}

impl TesseractOcr {
    /// Preflight the binary so a missing install fails with a clear message
    /// instead of a mid-scan spawn error.
    pub fn new(cfg: &ScanConfig) -> Result<Self> {
        which::which(&cfg.tesseract_cmd).with_context(|| {
            format!(
                "tesseract binary '{}' not found; install tesseract-ocr or pass --tesseract-cmd",
                cfg.tesseract_cmd
            )
        })?;
        Ok(Self {
            cmd: cfg.tesseract_cmd.clone(),
            lang: cfg.ocr_lang.clone(),
            engine_mode: cfg.ocr_engine_mode,
        })
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract-cli"
    }

    async fn recognize(&mut self, path: &Path, progress: &ProgressFn) -> Result<String> {
        progress(OcrProgress {
            status: OcrStatus::Initializing,
            fraction: 0.0,
        });

        let child = Command::new(&self.cmd)
            .arg(path)
            .arg("stdout")
            .args(["-l", &self.lang])
            .args(["--oem", &self.engine_mode.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future (reset mid-scan) must not leak the process.
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch '{}'", self.cmd))?;

        progress(OcrProgress {
            status: OcrStatus::Recognizing,
            fraction: 0.0,
        });
        let started = Instant::now();
        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Tesseract does not report progress on stdout, so estimate from
        // elapsed time while waiting for the process to finish.
        let mut wait = Box::pin(child.wait_with_output());
        let output = loop {
            tokio::select! {
                out = &mut wait => break out.context("waiting for tesseract")?,
                _ = ticker.tick() => {
                    let fraction = (started.elapsed().as_secs_f32()
                        / RECOGNITION_ESTIMATE.as_secs_f32())
                        .min(0.95);
                    progress(OcrProgress {
                        status: OcrStatus::Recognizing,
                        fraction,
                    });
                }
            }
        };
        progress(OcrProgress {
            status: OcrStatus::Recognizing,
            fraction: 1.0,
        });

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract failed ({}): {}", output.status, stderr.trim());
        }

        String::from_utf8(output.stdout).context("tesseract produced non-UTF-8 output")
    }

    async fn terminate(&mut self) -> Result<()> {
        // Each recognition spawns a fresh process that has already exited (or
        // been killed on drop) by the time this runs; nothing lingers.
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Scripted engine for pipeline tests: emits a fixed progress sequence,
    /// optionally sleeps, then returns canned text or an error.
    pub(crate) struct ScriptedOcr {
        pub text: Result<String, String>,
        pub progress_steps: Vec<f32>,
        pub delay: Duration,
        pub terminated: Arc<AtomicBool>,
    }

    impl ScriptedOcr {
        pub fn with_text(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                progress_steps: vec![0.0, 0.25, 0.5, 0.75, 1.0],
                delay: Duration::ZERO,
                terminated: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                text: Err(message.to_string()),
                progress_steps: vec![0.0],
                delay: Duration::ZERO,
                terminated: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn recognize(&mut self, _path: &Path, progress: &ProgressFn) -> Result<String> {
            progress(OcrProgress {
                status: OcrStatus::Initializing,
                fraction: 0.0,
            });
            for fraction in &self.progress_steps {
                progress(OcrProgress {
                    status: OcrStatus::Recognizing,
                    fraction: *fraction,
                });
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.text {
                Ok(t) => Ok(t.clone()),
                Err(e) => bail!("{e}"),
            }
        }

        async fn terminate(&mut self) -> Result<()> {
            self.terminated.store(true, Ordering::Relaxed);
            Ok(())
        }
    }
}
