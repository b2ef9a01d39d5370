use serde_json::Value;

use soundshift_core::{ApiBase, Category, ConvertService};

/// A local file staged for upload.
#[derive(Clone, Debug)]
pub struct LocalUpload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Submit a file for conversion.
///
/// 2xx responses decode to their JSON body; anything else becomes `Err`
/// carrying the body's `error` string when present, else `HTTP {status}`.
pub async fn submit_file(
    client: &reqwest::Client,
    base: &ApiBase,
    category: Category,
    upload: &LocalUpload,
) -> Result<Value, String> {
    let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
        .file_name(upload.filename.clone())
        .mime_str(&upload.mime)
        .map_err(|e| format!("Bad MIME type: {e}"))?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let resp = client
        .post(base.convert_url(category))
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("HTTP request failed: {e}"))?;

    decode_json(resp).await
}

/// Query progress for a task.
pub async fn fetch_progress(
    client: &reqwest::Client,
    base: &ApiBase,
    task_id: &str,
) -> Result<Value, String> {
    let resp = client
        .get(base.progress_url(task_id))
        .send()
        .await
        .map_err(|e| format!("HTTP request failed: {e}"))?;

    decode_json(resp).await
}

/// Download converted audio bytes from an absolute URL.
pub async fn download(client: &reqwest::Client, href: &str) -> Result<Vec<u8>, String> {
    let resp = client
        .get(href)
        .send()
        .await
        .map_err(|e| format!("Download failed: {e}"))?;

    if !resp.status().is_success() {
        return Err(format!("Download HTTP {}", resp.status()));
    }

    resp.bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| format!("Failed to read audio bytes: {e}"))
}

async fn decode_json(resp: reqwest::Response) -> Result<Value, String> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {e}"))?;
    let body: Value =
        serde_json::from_str(&text).map_err(|e| format!("Failed to parse JSON: {e}"))?;

    if !status.is_success() {
        return Err(body["error"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}")));
    }
    Ok(body)
}

/// `ConvertService` over a reqwest client, for non-browser hosts.
pub struct HttpConvertService {
    client: reqwest::Client,
    base: ApiBase,
}

impl HttpConvertService {
    pub fn new(client: reqwest::Client, base: ApiBase) -> Self {
        HttpConvertService { client, base }
    }
}

impl ConvertService for HttpConvertService {
    type Payload = LocalUpload;

    async fn submit(&self, category: Category, payload: &LocalUpload) -> Result<Value, String> {
        submit_file(&self.client, &self.base, category, payload).await
    }

    async fn progress(&self, task_id: &str) -> Result<Value, String> {
        fetch_progress(&self.client, &self.base, task_id).await
    }
}
