use crate::domain::model::{ChatRequest, ChatResponse, Completion};
use crate::domain::ports::ApiSettings;
use crate::utils::error::{ProbeError, Result, BODY_PREVIEW_CHARS};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::{Duration, Instant};

/// chat/completions 端點的最小客戶端：一次 POST，不重試
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    preview_chars: usize,
}

impl ChatClient {
    pub fn new<A: ApiSettings + ?Sized>(settings: &A) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.base_url().to_string(),
            api_key: settings.api_key().to_string(),
            timeout: settings.timeout(),
            preview_chars: BODY_PREVIEW_CHARS,
        }
    }

    /// 錯誤訊息中保留的回應字元數
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        tracing::debug!(
            "POST {} (model: {}, timeout: {:?})",
            self.endpoint,
            request.model,
            self.timeout
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let elapsed = start.elapsed();

        tracing::debug!("API response status: {} ({} bytes)", status, body.len());

        // 非 2xx 時不解析內容
        if !status.is_success() {
            return Err(ProbeError::http_status(status.as_u16(), &body, self.preview_chars));
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ProbeError::decode(e, &body, self.preview_chars))?;
        let response = ChatResponse::from_raw(&raw);

        Ok(Completion {
            response,
            raw,
            elapsed,
        })
    }
}
