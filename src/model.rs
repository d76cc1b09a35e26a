use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Official BESCOM quick-payment page. The account ID is never appended as a
/// query parameter; it travels via the clipboard only.
pub const DEFAULT_PORTAL_URL: &str = "https://www.bescom.co.in/bescom/main/quick-payment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub portal_url: String,
    pub ocr_lang: String,
    /// Tesseract OCR engine mode (`--oem`), 1 = LSTM only.
    pub ocr_engine_mode: u8,
    pub tesseract_cmd: String,
    pub auto_copy: bool,
    pub no_redirect: bool,
    /// Cosmetic pause between OCR completion and showing the result.
    #[serde(with = "humantime_serde")]
    pub thinking_pause: Duration,
    /// Delay before a valid extraction auto-triggers the redirect flow.
    #[serde(with = "humantime_serde")]
    pub auto_advance_delay: Duration,
    /// Countdown shown in the Redirecting view before the browser opens.
    #[serde(with = "humantime_serde")]
    pub redirect_countdown: Duration,
    #[serde(with = "humantime_serde")]
    pub countdown_tick: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStage {
    Upload,
    Scanning,
    Confirmation,
    Redirecting,
}

impl Default for WizardStage {
    fn default() -> Self {
        WizardStage::Upload
    }
}

impl WizardStage {
    pub const ALL: [WizardStage; 4] = [
        WizardStage::Upload,
        WizardStage::Scanning,
        WizardStage::Confirmation,
        WizardStage::Redirecting,
    ];

    /// 1-based ordinal used for the step indicators.
    pub fn ordinal(self) -> usize {
        match self {
            WizardStage::Upload => 1,
            WizardStage::Scanning => 2,
            WizardStage::Confirmation => 3,
            WizardStage::Redirecting => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStage::Upload => "Upload",
            WizardStage::Scanning => "Scanning",
            WizardStage::Confirmation => "Confirm",
            WizardStage::Redirecting => "Redirect",
        }
    }
}

/// Visual state of one step indicator relative to the active stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Completed,
    Active,
    Upcoming,
}

/// Indicators before the current stage are completed, the current one is
/// active, later ones neither.
pub fn step_mark(indicator: WizardStage, current: WizardStage) -> StepMark {
    use std::cmp::Ordering;
    match indicator.ordinal().cmp(&current.ordinal()) {
        Ordering::Less => StepMark::Completed,
        Ordering::Equal => StepMark::Active,
        Ordering::Greater => StepMark::Upcoming,
    }
}

/// Canned phase label derived from recognition progress. Cosmetic only; never
/// gates control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionPhase {
    LocatingSignature,
    IsolatingFields,
    ValidatingStructure,
    Finalizing,
}

impl RecognitionPhase {
    pub fn for_percent(percent: u8) -> Self {
        match percent {
            0..=29 => RecognitionPhase::LocatingSignature,
            30..=59 => RecognitionPhase::IsolatingFields,
            60..=89 => RecognitionPhase::ValidatingStructure,
            _ => RecognitionPhase::Finalizing,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecognitionPhase::LocatingSignature => "Locating regional DISCOM signature",
            RecognitionPhase::IsolatingFields => "Isolating account ID fields",
            RecognitionPhase::ValidatingStructure => "Validating 10-digit structure",
            RecognitionPhase::Finalizing => "Finalizing extraction results",
        }
    }
}

/// Result of one scan: the raw OCR buffer plus the extracted candidate
/// (possibly empty when neither heuristic rule matched).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub raw_text: String,
    pub candidate: String,
}

/// Events emitted by the orchestrator and engine, consumed by UI/CLI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardEvent {
    StageChanged(WizardStage),
    ScanProgress {
        percent: u8,
        phase: RecognitionPhase,
    },
    /// Identifier value changed (extraction result or manual edit); validity
    /// is recomputed on every change so it can never go stale.
    IdUpdated {
        value: String,
        valid: bool,
    },
    /// Blocking user-visible error.
    Alert(String),
    /// Informational status line.
    Notice(String),
    Copied,
    CountdownTick {
        #[serde(with = "humantime_serde")]
        remaining: Duration,
    },
    /// Terminal event: the portal is being opened (or would be, under
    /// `--no-redirect`).
    Navigated {
        url: String,
    },
}

/// Wizard state owned by the controller task. Components never touch ambient
/// globals; everything flows through this struct.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub stage: WizardStage,
    pub account_id: String,
    pub image: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_buckets_match_thresholds() {
        use RecognitionPhase::*;
        let cases = [
            (0, LocatingSignature),
            (29, LocatingSignature),
            (30, IsolatingFields),
            (59, IsolatingFields),
            (60, ValidatingStructure),
            (89, ValidatingStructure),
            (90, Finalizing),
            (100, Finalizing),
        ];
        for (pct, phase) in cases {
            assert_eq!(RecognitionPhase::for_percent(pct), phase, "percent {pct}");
        }
    }

    #[test]
    fn step_marks_follow_ordinals() {
        let current = WizardStage::Confirmation;
        assert_eq!(step_mark(WizardStage::Upload, current), StepMark::Completed);
        assert_eq!(
            step_mark(WizardStage::Scanning, current),
            StepMark::Completed
        );
        assert_eq!(
            step_mark(WizardStage::Confirmation, current),
            StepMark::Active
        );
        assert_eq!(
            step_mark(WizardStage::Redirecting, current),
            StepMark::Upcoming
        );
    }

    #[test]
    fn step_mark_is_idempotent_per_stage() {
        for s in WizardStage::ALL {
            assert_eq!(step_mark(s, s), StepMark::Active);
            assert_eq!(step_mark(s, s), StepMark::Active);
        }
    }
}
