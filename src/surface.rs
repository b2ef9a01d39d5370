use leptos::prelude::*;

use soundshift_core::progress::clamp_percent;
use soundshift_core::{Outcome, ZoneSurface};

use crate::state::AppState;

/// Tone of an inline label message, mirrored in CSS classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelTone {
    Error,
    Success,
    Processing,
}

impl LabelTone {
    pub fn class(self) -> &'static str {
        match self {
            LabelTone::Error => "message error",
            LabelTone::Success => "message success",
            LabelTone::Processing => "message processing",
        }
    }
}

/// What the zone's status label is currently showing.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelState {
    Hint,
    Message { text: String, tone: LabelTone },
    Download { href: String, filename: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUi {
    pub percent: f64,
    pub text: String,
}

/// Signal bundle backing one drop zone. Created once per zone and kept for
/// the page lifetime; the progress pair appears lazily on first use.
#[derive(Clone, Copy)]
pub struct ZoneUi {
    pub drag_over: RwSignal<bool>,
    pub progress: RwSignal<Option<ProgressUi>>,
    pub label: RwSignal<LabelState>,
}

impl ZoneUi {
    pub fn new() -> Self {
        ZoneUi {
            drag_over: RwSignal::new(false),
            progress: RwSignal::new(None),
            label: RwSignal::new(LabelState::Hint),
        }
    }
}

impl Default for ZoneUi {
    fn default() -> Self {
        ZoneUi::new()
    }
}

/// `ZoneSurface` binding over the zone's signals.
#[derive(Clone, Copy)]
pub struct SignalSurface {
    pub ui: ZoneUi,
    pub app: AppState,
}

impl ZoneSurface for SignalSurface {
    fn highlight(&self) {
        self.ui.drag_over.set(true);
    }

    fn unhighlight(&self) {
        self.ui.drag_over.set(false);
    }

    fn ensure_progress_surface(&self) {
        if self.ui.progress.get_untracked().is_none() {
            self.ui.progress.set(Some(ProgressUi {
                percent: 0.0,
                text: String::new(),
            }));
        }
    }

    fn set_progress(&self, percent: f64, text: &str) {
        if self.ui.progress.get_untracked().is_none() {
            return;
        }
        self.ui.progress.set(Some(ProgressUi {
            percent: clamp_percent(percent),
            text: text.to_string(),
        }));
    }

    fn show_terminal(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Rejected { message } => {
                self.ui.label.set(LabelState::Message {
                    text: message.clone(),
                    tone: LabelTone::Error,
                });
            }
            Outcome::UploadFailed { message } => {
                self.app.show_popup("Song not uploaded", message);
                self.ui.label.set(LabelState::Message {
                    text: "Upload failed. Try again.".to_string(),
                    tone: LabelTone::Error,
                });
            }
            Outcome::ConversionFailed { message } => {
                self.app.show_popup("Conversion failed", message);
                self.ui.label.set(LabelState::Message {
                    text: "Conversion failed. Please try again.".to_string(),
                    tone: LabelTone::Error,
                });
            }
            Outcome::Completed { href, filename } => {
                self.ui.label.set(LabelState::Download {
                    href: href.clone(),
                    filename: filename.clone(),
                });
            }
        }
    }
}
