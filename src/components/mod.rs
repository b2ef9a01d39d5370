pub mod app;
pub mod popup;
pub mod upload_zone;
