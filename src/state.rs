use leptos::prelude::*;

/// One modal failure notice.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    pub id: u64,
    pub title: String,
    pub message: String,
}

#[derive(Clone, Copy)]
pub struct AppState {
    pub popups: RwSignal<Vec<Popup>>,
    next_popup_id: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            popups: RwSignal::new(Vec::new()),
            next_popup_id: RwSignal::new(0),
        }
    }

    /// Raise a modal popup. Repeated failures stack; each popup is
    /// dismissed individually.
    pub fn show_popup(&self, title: &str, message: &str) {
        let id = self.next_popup_id.get_untracked();
        self.next_popup_id.set(id + 1);
        self.popups.update(|popups| {
            popups.push(Popup {
                id,
                title: title.to_string(),
                message: message.to_string(),
            })
        });
    }

    pub fn dismiss_popup(&self, id: u64) {
        self.popups.update(|popups| popups.retain(|p| p.id != id));
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}
