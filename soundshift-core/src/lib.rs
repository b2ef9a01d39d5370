pub mod category;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod surface;
pub mod types;
pub mod validate;

pub use category::Category;
pub use config::{ApiBase, DEFAULT_API_BASE, INITIAL_PERCENT, POLL_INTERVAL_MS};
pub use pipeline::{ConvertService, TickFlow, UploadPipeline};
pub use surface::{Outcome, ZoneSurface};
pub use types::{ProgressReport, TaskStatus};
