use std::cell::{Cell, RefCell};

use serde_json::Value;

use crate::category::Category;
use crate::config::{ApiBase, INITIAL_PERCENT};
use crate::surface::{Outcome, ZoneSurface};
use crate::types::{self, ProgressReport, TaskStatus};
use crate::validate;

/// Fallback when the service gives no error text.
const GENERIC_FAILURE: &str = "Please try again.";

/// Fallback when a task fails without an error field.
const FAILED_TASK_MESSAGE: &str = "Please try another file.";

const DEFAULT_DOWNLOAD_NAME: &str = "converted.wav";

/// Transport seam to the conversion service.
///
/// `Ok` is the decoded JSON body of a 2xx response. Implementations fold
/// non-2xx responses into `Err`, carrying the body's `error` string when
/// present (else `HTTP {status}`), and likewise fold transport and decode
/// failures into `Err`. `Payload` is whatever the host hands to a
/// multipart upload: a `web_sys::File` in the browser, bytes on native.
#[allow(async_fn_in_trait)]
pub trait ConvertService {
    type Payload;

    async fn submit(&self, category: Category, payload: &Self::Payload)
        -> Result<Value, String>;

    async fn progress(&self, task_id: &str) -> Result<Value, String>;
}

/// What the caller's timer should do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickFlow {
    /// Keep the timer running.
    Pending,
    /// The operation is terminal (or this timer is stale); cancel it.
    Done,
}

struct ActiveTask {
    task_id: String,
    generation: u64,
    last_percent: f64,
    in_flight: bool,
    done: bool,
}

/// Per-zone upload + poll state machine.
///
/// One active task at a time: every `begin` bumps the generation counter,
/// so responses and timer ticks belonging to an earlier operation become
/// inert instead of overwriting newer UI state. The poll schedule itself
/// is owned by the caller (a fixed-period timer); `poll_tick` performs at
/// most one outstanding request per task and latches terminal states.
pub struct UploadPipeline<S: ConvertService, U: ZoneSurface> {
    service: S,
    surface: U,
    base: ApiBase,
    category: Category,
    generation: Cell<u64>,
    task: RefCell<Option<ActiveTask>>,
}

impl<S: ConvertService, U: ZoneSurface> UploadPipeline<S, U> {
    pub fn new(service: S, surface: U, base: ApiBase, category: Category) -> Self {
        UploadPipeline {
            service,
            surface,
            base,
            category,
            generation: Cell::new(0),
            task: RefCell::new(None),
        }
    }

    pub fn surface(&self) -> &U {
        &self.surface
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Validate and upload one candidate file.
    ///
    /// Returns the generation the caller should poll with, or `None` when
    /// the operation ended here (rejected, upload failed, or superseded by
    /// a newer drop while the upload was in flight).
    pub async fn begin(&self, name: &str, mime: &str, payload: &S::Payload) -> Option<u64> {
        // Abandon whatever was running; its ticks and responses are stale now.
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        *self.task.borrow_mut() = None;

        if !validate::is_valid_audio_file(name, mime) {
            self.surface.show_terminal(&Outcome::Rejected {
                message: validate::REJECT_MESSAGE.to_string(),
            });
            return None;
        }

        self.surface.ensure_progress_surface();
        self.surface.set_progress(0.0, "Uploading...");

        let submitted = self.service.submit(self.category, payload).await;
        if self.generation.get() != generation {
            // A newer drop superseded this upload while it was in flight.
            return None;
        }

        let body = match submitted {
            Ok(body) => body,
            Err(message) => {
                log::error!("Upload error: {message}");
                self.surface.show_terminal(&Outcome::UploadFailed {
                    message: or_generic(message),
                });
                return None;
            }
        };

        let Some(task_id) = types::parse_task_id(&body) else {
            // A 2xx response without a task id is still an upload failure.
            let message =
                types::error_message(&body).unwrap_or_else(|| "Upload failed".to_string());
            log::error!("Upload error: {message}");
            self.surface.show_terminal(&Outcome::UploadFailed { message });
            return None;
        };

        log::info!("Upload accepted, task {task_id}");
        *self.task.borrow_mut() = Some(ActiveTask {
            task_id,
            generation,
            last_percent: INITIAL_PERCENT,
            in_flight: false,
            done: false,
        });
        self.surface.set_progress(INITIAL_PERCENT, "Loading...");
        Some(generation)
    }

    /// One tick of the fixed-period poll timer.
    ///
    /// Ticks are free-running, so a slow response can overlap the next
    /// tick; the in-flight flag makes the overlapping tick a no-request
    /// skip, and the generation re-check after the await keeps a late,
    /// superseded response from touching the UI.
    pub async fn poll_tick(&self, generation: u64) -> TickFlow {
        let task_id = {
            let mut task = self.task.borrow_mut();
            match task.as_mut() {
                Some(t) if t.generation == generation && !t.done => {
                    if t.in_flight {
                        return TickFlow::Pending;
                    }
                    t.in_flight = true;
                    t.task_id.clone()
                }
                _ => return TickFlow::Done,
            }
        };

        let polled = self.service.progress(&task_id).await;

        if !self.clear_in_flight(generation) {
            // Superseded while the request was in flight; drop the response.
            return TickFlow::Done;
        }

        let report = match polled {
            Ok(body) => ProgressReport::parse(&body),
            Err(message) => {
                log::error!("Progress error: {message}");
                self.latch_done(generation);
                self.surface.show_terminal(&Outcome::ConversionFailed {
                    message: or_generic(message),
                });
                return TickFlow::Done;
            }
        };

        let percent = self.advance_percent(generation, report.percent);
        self.surface
            .set_progress(percent, &types::status_message(report.status.as_deref()));

        match report.task_status() {
            Some(TaskStatus::Completed) => {
                if let Some(url) = report.download_url.as_deref() {
                    self.latch_done(generation);
                    let filename = report
                        .filename
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
                    self.surface.show_terminal(&Outcome::Completed {
                        href: self.base.download_href(url),
                        filename,
                    });
                    TickFlow::Done
                } else {
                    // Completed but no link yet; keep polling.
                    TickFlow::Pending
                }
            }
            Some(TaskStatus::Failed) => {
                let message = report
                    .error
                    .clone()
                    .unwrap_or_else(|| FAILED_TASK_MESSAGE.to_string());
                log::error!("Conversion failed: {message}");
                self.latch_done(generation);
                self.surface
                    .show_terminal(&Outcome::ConversionFailed { message });
                TickFlow::Done
            }
            _ => TickFlow::Pending,
        }
    }

    fn clear_in_flight(&self, generation: u64) -> bool {
        let mut task = self.task.borrow_mut();
        match task.as_mut() {
            Some(t) if t.generation == generation && !t.done => {
                t.in_flight = false;
                true
            }
            _ => false,
        }
    }

    fn latch_done(&self, generation: u64) {
        let mut task = self.task.borrow_mut();
        if let Some(t) = task.as_mut() {
            if t.generation == generation {
                t.done = true;
            }
        }
    }

    /// Retain the previous percent when the field is absent, and never let
    /// the displayed value regress.
    fn advance_percent(&self, generation: u64, reported: Option<f64>) -> f64 {
        let mut task = self.task.borrow_mut();
        match task.as_mut() {
            Some(t) if t.generation == generation => {
                let next = reported.unwrap_or(t.last_percent).max(t.last_percent);
                t.last_percent = next;
                next
            }
            _ => reported.unwrap_or(0.0),
        }
    }
}

fn or_generic(message: String) -> String {
    if message.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[derive(Clone, Debug, PartialEq)]
    enum SurfaceEvent {
        Ensure,
        Progress(f64, String),
        Terminal(Outcome),
    }

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<SurfaceEvent>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<SurfaceEvent> {
            self.events.borrow().clone()
        }

        fn terminals(&self) -> Vec<Outcome> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SurfaceEvent::Terminal(outcome) => Some(outcome),
                    _ => None,
                })
                .collect()
        }

        fn last_progress(&self) -> Option<(f64, String)> {
            self.events()
                .into_iter()
                .rev()
                .find_map(|e| match e {
                    SurfaceEvent::Progress(p, t) => Some((p, t)),
                    _ => None,
                })
        }
    }

    impl ZoneSurface for Recorder {
        fn highlight(&self) {}
        fn unhighlight(&self) {}
        fn ensure_progress_surface(&self) {
            self.events.borrow_mut().push(SurfaceEvent::Ensure);
        }
        fn set_progress(&self, percent: f64, text: &str) {
            self.events
                .borrow_mut()
                .push(SurfaceEvent::Progress(percent, text.to_string()));
        }
        fn show_terminal(&self, outcome: &Outcome) {
            self.events
                .borrow_mut()
                .push(SurfaceEvent::Terminal(outcome.clone()));
        }
    }

    /// Resolves on the second poll, letting another future run in between.
    #[derive(Default)]
    struct YieldOnce {
        yielded: bool,
    }

    impl Future for YieldOnce {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                Poll::Ready(())
            } else {
                self.yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[derive(Default)]
    struct ScriptedService {
        submits: RefCell<VecDeque<Result<Value, String>>>,
        polls: RefCell<VecDeque<Result<Value, String>>>,
        submit_calls: Cell<usize>,
        poll_calls: Cell<usize>,
        slow_poll: Cell<bool>,
    }

    impl ScriptedService {
        fn new(
            submits: Vec<Result<Value, String>>,
            polls: Vec<Result<Value, String>>,
        ) -> Self {
            ScriptedService {
                submits: RefCell::new(submits.into()),
                polls: RefCell::new(polls.into()),
                ..Default::default()
            }
        }
    }

    impl ConvertService for ScriptedService {
        type Payload = ();

        async fn submit(&self, _category: Category, _payload: &()) -> Result<Value, String> {
            self.submit_calls.set(self.submit_calls.get() + 1);
            self.submits
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("submit script exhausted".to_string()))
        }

        async fn progress(&self, _task_id: &str) -> Result<Value, String> {
            self.poll_calls.set(self.poll_calls.get() + 1);
            if self.slow_poll.get() {
                YieldOnce::default().await;
            }
            self.polls
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("poll script exhausted".to_string()))
        }
    }

    const BASE: &str = "http://localhost:5000";

    fn pipeline(service: ScriptedService) -> UploadPipeline<ScriptedService, Recorder> {
        UploadPipeline::new(
            service,
            Recorder::default(),
            ApiBase::new(BASE),
            Category::Phonk,
        )
    }

    fn kickoff(task_id: &str) -> Result<Value, String> {
        Ok(json!({ "task_id": task_id }))
    }

    fn running(status: &str, percent: f64) -> Result<Value, String> {
        Ok(json!({ "status": status, "percent": percent }))
    }

    fn begin(p: &UploadPipeline<ScriptedService, Recorder>) -> Option<u64> {
        block_on(p.begin("track.mp3", "audio/mpeg", &()))
    }

    #[test]
    fn rejected_file_makes_no_network_call() {
        let p = pipeline(ScriptedService::default());
        let generation = block_on(p.begin("notes.pdf", "application/pdf", &()));
        assert_eq!(generation, None);
        assert_eq!(p.service.submit_calls.get(), 0);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::Rejected {
                message: validate::REJECT_MESSAGE.to_string()
            }]
        );
    }

    #[test]
    fn kickoff_without_task_id_fails_without_polling() {
        let p = pipeline(ScriptedService::new(
            vec![Ok(json!({ "message": "accepted" }))],
            vec![],
        ));
        assert_eq!(begin(&p), None);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::UploadFailed {
                message: "Upload failed".to_string()
            }]
        );
        assert_eq!(p.service.poll_calls.get(), 0);
        // A tick scheduled anyway finds nothing to observe.
        assert_eq!(block_on(p.poll_tick(1)), TickFlow::Done);
        assert_eq!(p.service.poll_calls.get(), 0);
    }

    #[test]
    fn kickoff_error_field_is_surfaced() {
        let p = pipeline(ScriptedService::new(
            vec![Ok(json!({ "error": "No file provided" }))],
            vec![],
        ));
        assert_eq!(begin(&p), None);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::UploadFailed {
                message: "No file provided".to_string()
            }]
        );
    }

    #[test]
    fn upload_transport_failure_is_surfaced() {
        let p = pipeline(ScriptedService::new(
            vec![Err("HTTP 500: out of disk".to_string())],
            vec![],
        ));
        assert_eq!(begin(&p), None);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::UploadFailed {
                message: "HTTP 500: out of disk".to_string()
            }]
        );
    }

    #[test]
    fn successful_flow_ends_with_download_link_and_stops() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![
                running("queued", 10.0),
                running("processing", 55.0),
                Ok(json!({
                    "status": "completed",
                    "percent": 100.0,
                    "download_url": "/download/t-1_phonk_track.wav",
                    "filename": "track_phonk.wav",
                })),
            ],
        ));
        let generation = begin(&p).expect("upload should yield a task");
        assert_eq!(p.surface().last_progress(), Some((10.0, "Loading...".into())));

        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Pending);
        assert_eq!(p.surface().last_progress(), Some((10.0, "queued".into())));
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Pending);
        assert_eq!(
            p.surface().last_progress(),
            Some((55.0, "processing".into()))
        );
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);

        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::Completed {
                href: format!("{BASE}/download/t-1_phonk_track.wav"),
                filename: "track_phonk.wav".to_string(),
            }]
        );

        // The operation is latched: later ticks neither poll nor repaint.
        let before = p.surface().events();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(p.surface().events(), before);
        assert_eq!(p.service.poll_calls.get(), 3);
    }

    #[test]
    fn completed_filename_defaults_when_absent() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![Ok(json!({ "status": "completed", "download_url": "/download/out" }))],
        ));
        let generation = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::Completed {
                href: format!("{BASE}/download/out"),
                filename: "converted.wav".to_string(),
            }]
        );
    }

    #[test]
    fn completed_without_download_url_keeps_polling() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![
                Ok(json!({ "status": "completed", "percent": 100.0 })),
                Ok(json!({ "status": "completed", "percent": 100.0, "download_url": "/download/out" })),
            ],
        ));
        let generation = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Pending);
        assert!(p.surface().terminals().is_empty());
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(p.surface().terminals().len(), 1);
    }

    #[test]
    fn failed_status_stops_polling_with_service_error() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![
                running("processing", 30.0),
                Ok(json!({ "status": "failed", "error": "bad codec" })),
            ],
        ));
        let generation = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Pending);
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::ConversionFailed {
                message: "bad codec".to_string()
            }]
        );

        let before = p.surface().events();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(p.surface().events(), before);
    }

    #[test]
    fn failed_status_without_error_uses_fallback() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![Ok(json!({ "status": "failed" }))],
        ));
        let generation = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::ConversionFailed {
                message: FAILED_TASK_MESSAGE.to_string()
            }]
        );
    }

    #[test]
    fn poll_transport_failure_is_terminal() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![Err("network down".to_string())],
        ));
        let generation = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(generation)), TickFlow::Done);
        assert_eq!(
            p.surface().terminals(),
            vec![Outcome::ConversionFailed {
                message: "network down".to_string()
            }]
        );
    }

    #[test]
    fn missing_percent_retains_last_value() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![
                running("processing", 55.0),
                Ok(json!({ "status": "writing" })),
                Ok(json!({ "status": "writing", "percent": "60" })),
            ],
        ));
        let generation = begin(&p).unwrap();
        block_on(p.poll_tick(generation));
        assert_eq!(
            p.surface().last_progress(),
            Some((55.0, "processing".into()))
        );
        block_on(p.poll_tick(generation));
        assert_eq!(
            p.surface().last_progress(),
            Some((55.0, "Finalizing...".into()))
        );
        // A mistyped percent is treated the same as an absent one.
        block_on(p.poll_tick(generation));
        assert_eq!(
            p.surface().last_progress(),
            Some((55.0, "Finalizing...".into()))
        );
    }

    #[test]
    fn first_poll_without_percent_holds_the_initial_value() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![Ok(json!({ "status": "queued" }))],
        ));
        let generation = begin(&p).unwrap();
        block_on(p.poll_tick(generation));
        assert_eq!(p.surface().last_progress(), Some((10.0, "queued".into())));
    }

    #[test]
    fn displayed_percent_never_regresses() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![running("processing", 55.0), running("processing", 40.0)],
        ));
        let generation = begin(&p).unwrap();
        block_on(p.poll_tick(generation));
        block_on(p.poll_tick(generation));
        assert_eq!(
            p.surface().last_progress(),
            Some((55.0, "processing".into()))
        );
    }

    #[test]
    fn second_begin_abandons_previous_task() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1"), kickoff("t-2")],
            vec![running("processing", 40.0), running("processing", 70.0)],
        ));
        let first = begin(&p).unwrap();
        assert_eq!(block_on(p.poll_tick(first)), TickFlow::Pending);

        let second = begin(&p).unwrap();
        assert_ne!(first, second);

        // The old timer fires once more, observes it is stale, and cancels
        // itself without touching the UI.
        let before = p.surface().events();
        assert_eq!(block_on(p.poll_tick(first)), TickFlow::Done);
        assert_eq!(p.surface().events(), before);

        assert_eq!(block_on(p.poll_tick(second)), TickFlow::Pending);
        assert_eq!(
            p.surface().last_progress(),
            Some((70.0, "processing".into()))
        );
    }

    #[test]
    fn late_response_of_superseded_task_is_dropped() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1"), kickoff("t-2")],
            vec![running("processing", 99.0)],
        ));
        let first = begin(&p).unwrap();
        p.service.slow_poll.set(true);

        // The first task's poll is in flight when a new file is dropped.
        let (flow, second) = block_on(async {
            futures::join!(p.poll_tick(first), async {
                p.service.slow_poll.set(false);
                p.begin("other.wav", "audio/wav", &()).await
            })
        });
        assert_eq!(flow, TickFlow::Done);
        let second = second.unwrap();

        // The stale 99% never reached the surface; the new task's initial
        // acknowledgement is the latest progress.
        assert_eq!(
            p.surface().last_progress(),
            Some((10.0, "Loading...".into()))
        );
        assert_eq!(block_on(p.poll_tick(second)), TickFlow::Done);
    }

    #[test]
    fn overlapping_ticks_share_one_request() {
        let p = pipeline(ScriptedService::new(
            vec![kickoff("t-1")],
            vec![running("processing", 25.0)],
        ));
        let generation = begin(&p).unwrap();
        p.service.slow_poll.set(true);

        let (first, second) =
            block_on(async { futures::join!(p.poll_tick(generation), p.poll_tick(generation)) });
        assert_eq!(first, TickFlow::Pending);
        assert_eq!(second, TickFlow::Pending);
        assert_eq!(p.service.poll_calls.get(), 1);
        assert_eq!(
            p.surface().last_progress(),
            Some((25.0, "processing".into()))
        );
    }
}
