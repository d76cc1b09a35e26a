use crate::model::{RecognitionPhase, WizardEvent, WizardStage};
use std::time::{Duration, Instant};

/// UI-side view of the wizard. Owned by the UI thread only; it is rebuilt
/// purely from the controller's event stream, never mutated cross-thread.
pub struct UiState {
    pub stage: WizardStage,
    /// Path being typed in the Upload view.
    pub path_input: String,
    /// Identifier shown in the Confirmation view.
    pub id_input: String,
    pub id_valid: bool,
    pub progress_percent: u8,
    pub phase: RecognitionPhase,
    pub info: String,
    /// Modal alert; blocks input until dismissed with any key.
    pub alert: Option<String>,
    pub copied_at: Option<Instant>,
    pub countdown_remaining: Option<Duration>,
    pub countdown_dots: usize,
    pub navigated_url: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            stage: WizardStage::Upload,
            path_input: String::new(),
            id_input: String::new(),
            id_valid: false,
            progress_percent: 0,
            phase: RecognitionPhase::LocatingSignature,
            info: String::new(),
            alert: None,
            copied_at: None,
            countdown_remaining: None,
            countdown_dots: 0,
            navigated_url: None,
        }
    }
}

/// How long the "copied" feedback stays visible.
const COPIED_FEEDBACK: Duration = Duration::from_secs(2);

impl UiState {
    pub fn apply_event(&mut self, ev: WizardEvent) {
        match ev {
            WizardEvent::StageChanged(stage) => {
                self.stage = stage;
                if stage == WizardStage::Upload {
                    self.progress_percent = 0;
                    self.phase = RecognitionPhase::LocatingSignature;
                }
            }
            WizardEvent::ScanProgress { percent, phase } => {
                self.progress_percent = percent;
                self.phase = phase;
            }
            WizardEvent::IdUpdated { value, valid } => {
                self.id_input = value;
                self.id_valid = valid;
            }
            WizardEvent::Alert(msg) => self.alert = Some(msg),
            WizardEvent::Notice(msg) => self.info = msg,
            WizardEvent::Copied => self.copied_at = Some(Instant::now()),
            WizardEvent::CountdownTick { remaining } => {
                self.countdown_remaining = Some(remaining);
                self.countdown_dots = (self.countdown_dots + 1) % 4;
            }
            WizardEvent::Navigated { url } => self.navigated_url = Some(url),
        }
    }

    pub fn copied_recently(&self) -> bool {
        self.copied_at
            .map(|t| t.elapsed() < COPIED_FEEDBACK)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_rebuild_view_state() {
        let mut s = UiState::default();
        s.apply_event(WizardEvent::StageChanged(WizardStage::Scanning));
        s.apply_event(WizardEvent::ScanProgress {
            percent: 45,
            phase: RecognitionPhase::for_percent(45),
        });
        assert_eq!(s.stage, WizardStage::Scanning);
        assert_eq!(s.progress_percent, 45);
        assert_eq!(s.phase, RecognitionPhase::IsolatingFields);

        s.apply_event(WizardEvent::IdUpdated {
            value: "1234567890".into(),
            valid: true,
        });
        s.apply_event(WizardEvent::StageChanged(WizardStage::Confirmation));
        assert!(s.id_valid);
        assert_eq!(s.id_input, "1234567890");
    }

    #[test]
    fn returning_to_upload_clears_progress() {
        let mut s = UiState::default();
        s.apply_event(WizardEvent::ScanProgress {
            percent: 80,
            phase: RecognitionPhase::for_percent(80),
        });
        s.apply_event(WizardEvent::StageChanged(WizardStage::Upload));
        assert_eq!(s.progress_percent, 0);
    }
}
