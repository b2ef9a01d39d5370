use crate::category::Category;

/// Default origin of the conversion service.
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

/// Fixed period of the progress poll timer.
pub const POLL_INTERVAL_MS: u32 = 700;

/// Percent shown as soon as the service acknowledges an upload.
pub const INITIAL_PERCENT: f64 = 10.0;

/// API origin of the conversion service, fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn new(origin: impl Into<String>) -> Self {
        let mut origin = origin.into();
        while origin.ends_with('/') {
            origin.pop();
        }
        ApiBase(origin)
    }

    pub fn origin(&self) -> &str {
        &self.0
    }

    pub fn convert_url(&self, category: Category) -> String {
        format!("{}/convert/{}", self.0, category.as_str())
    }

    pub fn progress_url(&self, task_id: &str) -> String {
        format!("{}/progress/{}", self.0, task_id)
    }

    /// Absolute download URL from the server-relative path in a progress
    /// response.
    pub fn download_href(&self, download_path: &str) -> String {
        if download_path.starts_with('/') {
            format!("{}{}", self.0, download_path)
        } else {
            format!("{}/{}", self.0, download_path)
        }
    }
}

impl Default for ApiBase {
    fn default() -> Self {
        ApiBase::new(DEFAULT_API_BASE)
    }
}
