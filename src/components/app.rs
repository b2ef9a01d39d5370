use leptos::prelude::*;

use soundshift_core::{ApiBase, Category, DEFAULT_API_BASE};

use crate::components::popup::PopupStack;
use crate::components::upload_zone::UploadZone;
use crate::state::AppState;

#[component]
pub fn App() -> impl IntoView {
    let state = AppState::new();
    provide_context(state);
    provide_context(ApiBase::new(DEFAULT_API_BASE));

    let category = page_category();
    log::info!("Upload zone bound for category '{category}'");

    view! {
        <div class="app">
            <header class="page-header">
                <h1>{category.title()}</h1>
                <p class="tagline">"Drop a track and get it back converted."</p>
            </header>
            <UploadZone category=category />
            <PopupStack />
        </div>
    }
}

/// The page body carries a single marker class naming its category; a page
/// without one submits as `unknown` and lets the server decide.
fn page_category() -> Category {
    let classes = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
        .map(|body| body.class_name())
        .unwrap_or_default();
    Category::from_marker_classes(&classes)
}
