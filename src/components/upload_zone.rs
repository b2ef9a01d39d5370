use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};

use soundshift_core::{
    ApiBase, Category, TickFlow, UploadPipeline, ZoneSurface, POLL_INTERVAL_MS,
};

use crate::fetch::FetchConvertService;
use crate::state::AppState;
use crate::surface::{LabelState, SignalSurface, ZoneUi};

type ZonePipeline = UploadPipeline<FetchConvertService, SignalSurface>;

/// One drop zone, bound to its page's category for the page lifetime.
#[component]
pub fn UploadZone(category: Category) -> impl IntoView {
    let app = expect_context::<AppState>();
    let base = expect_context::<ApiBase>();

    let ui = ZoneUi::new();
    let surface = SignalSurface { ui, app };
    let pipeline = Rc::new(UploadPipeline::new(
        FetchConvertService::new(base.clone()),
        surface,
        base,
        category,
    ));

    let file_input_ref = NodeRef::<leptos::html::Input>::new();

    let start_upload = {
        let pipeline = Rc::clone(&pipeline);
        move |file: web_sys::File| {
            let pipeline = Rc::clone(&pipeline);
            spawn_local(async move {
                let name = file.name();
                let mime = file.type_();
                if let Some(generation) = pipeline.begin(&name, &mime, &file).await {
                    start_polling(pipeline, generation);
                }
            });
        }
    };

    let on_dragenter = move |ev: DragEvent| {
        ev.prevent_default();
        ev.stop_propagation();
        surface.highlight();
    };
    let on_dragover = move |ev: DragEvent| {
        ev.prevent_default();
        ev.stop_propagation();
        surface.highlight();
    };
    let on_dragleave = move |ev: DragEvent| {
        ev.prevent_default();
        ev.stop_propagation();
        surface.unhighlight();
    };

    let start_for_drop = start_upload.clone();
    let on_drop = move |ev: DragEvent| {
        ev.prevent_default();
        ev.stop_propagation();
        surface.unhighlight();

        let Some(dt) = ev.data_transfer() else { return };
        let Some(files) = dt.files() else { return };
        // Only the first file of a multi-file drop is processed.
        let Some(file) = files.get(0) else { return };
        start_for_drop(file);
    };

    let on_browse_click = move |_: web_sys::MouseEvent| {
        if let Some(input) = file_input_ref.get() {
            let el: &HtmlInputElement = input.as_ref();
            el.click();
        }
    };

    let start_for_input = start_upload.clone();
    let on_file_input_change = move |ev: web_sys::Event| {
        let Some(target) = ev.target() else { return };
        let input: HtmlInputElement = target.unchecked_into();
        if let Some(files) = input.files() {
            if let Some(file) = files.get(0) {
                start_for_input(file);
            }
        }
        // Reset so the same file can be re-selected.
        input.set_value("");
    };

    view! {
        <div class="uploader">
            <div
                class=move || {
                    if ui.drag_over.get() { "drop-zone is-dragover" } else { "drop-zone" }
                }
                on:dragenter=on_dragenter
                on:dragover=on_dragover
                on:dragleave=on_dragleave
                on:drop=on_drop
            >
                <input
                    node_ref=file_input_ref
                    type="file"
                    accept=".mp3,.wav,.m4a,.flac"
                    style="display:none"
                    on:change=on_file_input_change
                />
                <div class="drop-hint">
                    "Drop your track here"
                    <button class="upload-btn" on:click=on_browse_click>"Browse files"</button>
                </div>
                <FileLabel ui=ui />
                <ZoneProgress ui=ui />
            </div>
        </div>
    }
}

#[component]
fn FileLabel(ui: ZoneUi) -> impl IntoView {
    view! {
        <div class="file-label">
            {move || match ui.label.get() {
                LabelState::Hint => {
                    view! { <span class="hint">"MP3, WAV, M4A or FLAC"</span> }.into_any()
                }
                LabelState::Message { text, tone } => {
                    view! { <span class=tone.class()>{text}</span> }.into_any()
                }
                LabelState::Download { href, filename } => {
                    view! {
                        <span class="message success">"Conversion complete!"</span>
                        <a class="download-link" href=href download=filename>
                            "Download Converted File"
                        </a>
                    }
                    .into_any()
                }
            }}
        </div>
    }
}

#[component]
fn ZoneProgress(ui: ZoneUi) -> impl IntoView {
    view! {
        {move || {
            ui.progress.get().map(|p| {
                view! {
                    <div class="progress">
                        <div class="progress-bar" style=format!("width:{}%", p.percent)></div>
                        <span class="progress-text">{p.text}</span>
                    </div>
                }
            })
        }}
    }
}

/// Drive the pipeline on a free-running fixed-period timer, exactly like
/// the `setInterval` schedule it models. The first tick that observes a
/// terminal or stale task clears the interval and releases its closure.
fn start_polling(pipeline: Rc<ZonePipeline>, generation: u64) {
    let Some(window) = web_sys::window() else { return };

    let interval_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
    let tick_closure: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

    let closure = {
        let interval_id = Rc::clone(&interval_id);
        let tick_closure = Rc::clone(&tick_closure);
        Closure::wrap(Box::new(move || {
            let pipeline = Rc::clone(&pipeline);
            let interval_id = Rc::clone(&interval_id);
            let tick_closure = Rc::clone(&tick_closure);
            spawn_local(async move {
                if pipeline.poll_tick(generation).await == TickFlow::Done {
                    if let Some(id) = interval_id.take() {
                        if let Some(window) = web_sys::window() {
                            window.clear_interval_with_handle(id);
                        }
                    }
                    tick_closure.borrow_mut().take();
                }
            });
        }) as Box<dyn FnMut()>)
    };

    match window.set_interval_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        POLL_INTERVAL_MS as i32,
    ) {
        Ok(id) => {
            interval_id.set(Some(id));
            *tick_closure.borrow_mut() = Some(closure);
        }
        Err(e) => {
            log::error!("Failed to start progress timer: {e:?}");
        }
    }
}
