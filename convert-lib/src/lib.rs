pub mod api;

pub use api::{HttpConvertService, LocalUpload};
