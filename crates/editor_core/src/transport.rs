use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{multipart::Form, Client};
use shared::{
    domain::{HandlerOption, ImageFormat, PreviewResult, SchemaDocument},
    protocol::{
        HandlerRequest, HandlerResponse, PreviewResponse, HANDLERS_PATH, PREVIEW_PATH, SCHEMA_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    preview_sync::{PreviewError, PreviewSubmission},
    registry::{HandlerCall, SchemaHandler},
};

#[async_trait]
pub trait PreviewBackend: Send + Sync {
    async fn render(&self, submission: PreviewSubmission) -> Result<PreviewResult, PreviewError>;
}

/// Backend that is never reachable; every render fails as a transport error.
pub struct MissingPreviewBackend;

#[async_trait]
impl PreviewBackend for MissingPreviewBackend {
    async fn render(&self, _submission: PreviewSubmission) -> Result<PreviewResult, PreviewError> {
        Err(PreviewError::Transport(
            "rendering backend unavailable".to_string(),
        ))
    }
}

/// HTTP client for the rendering server's preview, schema and handler
/// endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid backend url: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("backend url must start with http:// or https://"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to build endpoint url for {path}"))
    }

    fn handler_endpoint(&self, handler: &str) -> Result<Url> {
        let mut url = self.endpoint(HANDLERS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend url cannot carry path segments"))?
            .push(handler);
        Ok(url)
    }

    pub async fn fetch_schema(&self) -> Result<SchemaDocument> {
        let url = self.endpoint(SCHEMA_PATH)?;
        let schema = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to fetch schema")?
            .error_for_status()?
            .json()
            .await
            .context("malformed schema document")?;
        Ok(schema)
    }

    async fn post_preview(&self, submission: PreviewSubmission) -> Result<PreviewResponse> {
        let url = self.endpoint(PREVIEW_PATH)?;
        let form = submission
            .fields
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value));
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl PreviewBackend for HttpBackend {
    async fn render(&self, submission: PreviewSubmission) -> Result<PreviewResult, PreviewError> {
        let response = self
            .post_preview(submission)
            .await
            .map_err(|err| PreviewError::Transport(format!("{err:#}")))?;
        decode_preview(response)
    }
}

#[async_trait]
impl SchemaHandler for HttpBackend {
    async fn call(&self, call: HandlerCall) -> Result<Vec<HandlerOption>> {
        let url = self.handler_endpoint(&call.handler)?;
        let body = HandlerRequest {
            config: call
                .config
                .into_iter()
                .map(|entry| (entry.id, entry.value))
                .collect(),
            id: call.field_id,
            param: call.param,
        };
        debug!(handler = %call.handler, url = %url, "handler: posting invocation");
        let options: HandlerResponse = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("malformed options from handler {}", call.handler))?;
        Ok(options)
    }
}

/// Turns the wire response into a preview. A response with a non-empty
/// `error` is a render failure even if it carries an image.
pub fn decode_preview(response: PreviewResponse) -> Result<PreviewResult, PreviewError> {
    if let Some(err) = response.error.filter(|err| !err.is_empty()) {
        return Err(PreviewError::Render(err));
    }
    let image_bytes = STANDARD
        .decode(response.img.as_bytes())
        .map_err(|err| PreviewError::Render(format!("decoding image: {err}")))?;
    Ok(PreviewResult {
        image_bytes,
        image_format: ImageFormat::from_tag(&response.img_type).unwrap_or(ImageFormat::Webp),
        width: response.width,
        height: response.height,
        title: response.title,
        loading: false,
    })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
