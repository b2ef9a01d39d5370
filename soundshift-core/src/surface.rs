/// Terminal result of one upload operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Candidate rejected before any network call. Inline message only.
    Rejected { message: String },
    /// The upload request failed, or the kickoff response carried no task
    /// identifier.
    UploadFailed { message: String },
    /// The conversion failed server-side, or the poll loop lost the
    /// service.
    ConversionFailed { message: String },
    /// Converted file ready for download.
    Completed { href: String, filename: String },
}

/// Capabilities a drop zone's UI binding exposes to the pipeline.
///
/// Implemented over Leptos signals in the web app, over stderr in the CLI,
/// and by a recorder in tests. None of these operations may fail; a
/// binding with nothing to render treats the call as a no-op.
pub trait ZoneSurface {
    /// Apply the drag-over highlight. Idempotent.
    fn highlight(&self);
    fn unhighlight(&self);
    /// Create the progress bar + status text pair if absent. Idempotent.
    fn ensure_progress_surface(&self);
    /// Update the bar and status text. Surfaces clamp percent to [0, 100].
    fn set_progress(&self, percent: f64, text: &str);
    /// Apply a terminal outcome: inline message, download link, and (for
    /// failures) the popup notifier.
    fn show_terminal(&self, outcome: &Outcome);
}
