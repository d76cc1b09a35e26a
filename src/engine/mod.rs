//! Extraction pipeline: image -> recognized text -> candidate account ID.
//!
//! The engine is purely reactive plumbing around the OCR capability; stage
//! transitions belong to the orchestrator, which spawns one engine run per
//! uploaded image.

pub mod ocr;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use crate::extract;
use crate::model::{RecognitionPhase, ScanConfig, ScanOutcome, WizardEvent};
use ocr::OcrEngine;

pub struct ScanEngine {
    cfg: ScanConfig,
    ocr: Box<dyn OcrEngine>,
}

impl ScanEngine {
    pub fn new(cfg: ScanConfig, ocr: Box<dyn OcrEngine>) -> Self {
        Self { cfg, ocr }
    }

    /// Run one scan. Emits `ScanProgress` events; the OCR engine is released
    /// whether recognition succeeds or fails.
    pub async fn run(
        mut self,
        image: PathBuf,
        event_tx: UnboundedSender<WizardEvent>,
    ) -> Result<ScanOutcome> {
        tokio::fs::metadata(&image)
            .await
            .with_context(|| format!("cannot read bill image '{}'", image.display()))?;

        let tx = event_tx.clone();
        let progress = move |p: ocr::OcrProgress| {
            // Only the recognizing phase carries meaningful fractions.
            if p.status != ocr::OcrStatus::Recognizing {
                return;
            }
            let percent = (p.fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
            let _ = tx.send(WizardEvent::ScanProgress {
                percent,
                phase: RecognitionPhase::for_percent(percent),
            });
        };

        let recognized = self.ocr.recognize(&image, &progress).await;

        // Release the worker on both paths; a failed release is not fatal.
        if let Err(e) = self.ocr.terminate().await {
            tracing::warn!(engine = self.ocr.name(), error = %e, "OCR engine release failed");
        }

        let text = recognized.context("OCR recognition failed")?;
        tracing::debug!(bytes = text.len(), "raw extraction buffer:\n{text}");

        if !self.cfg.thinking_pause.is_zero() {
            tokio::time::sleep(self.cfg.thinking_pause).await;
        }

        let candidate = extract::find_account_id(&text);
        Ok(ScanOutcome {
            raw_text: text,
            candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ocr::testing::ScriptedOcr;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_config() -> ScanConfig {
        ScanConfig {
            portal_url: crate::model::DEFAULT_PORTAL_URL.to_string(),
            ocr_lang: "eng".to_string(),
            ocr_engine_mode: 1,
            tesseract_cmd: "tesseract".to_string(),
            auto_copy: false,
            no_redirect: true,
            thinking_pause: Duration::ZERO,
            auto_advance_delay: Duration::ZERO,
            redirect_countdown: Duration::ZERO,
            countdown_tick: Duration::from_millis(1),
        }
    }

    fn temp_image() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[tokio::test]
    async fn scan_extracts_candidate_and_releases_engine() {
        let ocr = ScriptedOcr::with_text("BESCOM RR NO: 1234567890 Due Date 09/08/2024");
        let terminated = ocr.terminated.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let image = temp_image();

        let engine = ScanEngine::new(test_config(), Box::new(ocr));
        let outcome = engine.run(image.path().to_path_buf(), tx).await.unwrap();

        assert_eq!(outcome.candidate, "1234567890");
        assert!(terminated.load(Ordering::Relaxed));

        // Progress fractions map to percentages with bucketed phase labels.
        let mut percents = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let WizardEvent::ScanProgress { percent, phase } = ev {
                assert_eq!(phase, RecognitionPhase::for_percent(percent));
                percents.push(percent);
            }
        }
        assert_eq!(percents, vec![0, 25, 50, 75, 100]);
    }

    #[tokio::test]
    async fn extraction_miss_yields_empty_candidate() {
        let ocr = ScriptedOcr::with_text("Total due Rs. 1,234 by 09/08/2024");
        let (tx, _rx) = mpsc::unbounded_channel();
        let image = temp_image();

        let engine = ScanEngine::new(test_config(), Box::new(ocr));
        let outcome = engine.run(image.path().to_path_buf(), tx).await.unwrap();
        assert_eq!(outcome.candidate, "");
    }

    #[tokio::test]
    async fn recognition_failure_still_releases_engine() {
        let ocr = ScriptedOcr::failing("corrupt image");
        let terminated = ocr.terminated.clone();
        let (tx, _rx) = mpsc::unbounded_channel();
        let image = temp_image();

        let engine = ScanEngine::new(test_config(), Box::new(ocr));
        let err = engine
            .run(image.path().to_path_buf(), tx)
            .await
            .expect_err("scan should fail");
        assert!(err.to_string().contains("OCR recognition failed"));
        assert!(terminated.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn missing_image_is_an_ingestion_error() {
        let ocr = ScriptedOcr::with_text("1234567890");
        let (tx, _rx) = mpsc::unbounded_channel();

        let engine = ScanEngine::new(test_config(), Box::new(ocr));
        let err = engine
            .run(PathBuf::from("/nonexistent/bill.png"), tx)
            .await
            .expect_err("missing file should fail");
        assert!(err.to_string().contains("cannot read bill image"));
    }
}
