use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{FormData, Request, RequestInit, Response};

use soundshift_core::{ApiBase, Category, ConvertService};

/// Conversion service reached through the browser's `fetch`.
#[derive(Clone)]
pub struct FetchConvertService {
    base: ApiBase,
}

impl FetchConvertService {
    pub fn new(base: ApiBase) -> Self {
        FetchConvertService { base }
    }
}

impl ConvertService for FetchConvertService {
    type Payload = web_sys::File;

    async fn submit(&self, category: Category, file: &web_sys::File) -> Result<Value, String> {
        let form = FormData::new().map_err(|e| format!("FormData: {e:?}"))?;
        form.append_with_blob_and_filename("file", file, &file.name())
            .map_err(|e| format!("FormData append: {e:?}"))?;

        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_body(&form);

        let request = Request::new_with_str_and_init(&self.base.convert_url(category), &opts)
            .map_err(|e| format!("Request: {e:?}"))?;
        fetch_json(&request).await
    }

    async fn progress(&self, task_id: &str) -> Result<Value, String> {
        let request = Request::new_with_str(&self.base.progress_url(task_id))
            .map_err(|e| format!("Request: {e:?}"))?;
        fetch_json(&request).await
    }
}

/// Issue a request and decode the JSON body. Non-2xx responses become
/// `Err` carrying the body's `error` string when present.
async fn fetch_json(request: &Request) -> Result<Value, String> {
    let window = web_sys::window().ok_or("No window")?;
    let resp_value = JsFuture::from(window.fetch_with_request(request))
        .await
        .map_err(|e| format!("fetch error: {e:?}"))?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| "Response cast failed".to_string())?;

    let status = resp.status();
    let ok = resp.ok();
    let text = JsFuture::from(resp.text().map_err(|e| format!("{e:?}"))?)
        .await
        .map_err(|e| format!("text: {e:?}"))?
        .as_string()
        .ok_or("Not a string")?;
    let body: Value =
        serde_json::from_str(&text).map_err(|e| format!("Malformed response: {e}"))?;

    if !ok {
        return Err(body["error"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}")));
    }
    Ok(body)
}
