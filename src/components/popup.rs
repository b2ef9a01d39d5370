use leptos::prelude::*;

use crate::state::AppState;

/// Stacked modal failure notices. A popup never auto-dismisses; each one
/// goes away only through its own OK button.
#[component]
pub fn PopupStack() -> impl IntoView {
    let app = expect_context::<AppState>();

    view! {
        {move || {
            app.popups
                .get()
                .into_iter()
                .map(|popup| {
                    let id = popup.id;
                    view! {
                        <div class="popup">
                            <div class="popup-card">
                                <strong>{popup.title}</strong>
                                <p>{popup.message}</p>
                                <button class="popup-close" on:click=move |_| app.dismiss_popup(id)>
                                    "OK"
                                </button>
                            </div>
                        </div>
                    }
                })
                .collect::<Vec<_>>()
        }}
    }
}
