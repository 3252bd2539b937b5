use crate::adapters::http::ChatClient;
use crate::config::DEFAULT_PAUSE_SECS;
use crate::domain::ports::{Probe, ProbeReport};
use crate::utils::error::{truncate_chars, Result};
use std::time::{Duration, Instant};

const PROMPT_PREVIEW_CHARS: usize = 200;

/// 依序執行探測中規劃的請求；任一步失敗即中止
pub struct ProbeEngine<P: Probe> {
    probe: P,
    client: ChatClient,
    pause: Duration,
}

impl<P: Probe> ProbeEngine<P> {
    pub fn new(probe: P, client: ChatClient) -> Self {
        Self {
            probe,
            client,
            pause: Duration::from_secs(DEFAULT_PAUSE_SECS),
        }
    }

    /// 連續兩次請求之間的固定間隔
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub async fn run(&self) -> Result<ProbeReport> {
        let start = Instant::now();
        tracing::info!("🚀 Starting {} probe against {}", self.probe.name(), self.client.endpoint());

        let plan = self.probe.plan().await?;
        tracing::debug!("{} planned {} request(s)", self.probe.name(), plan.len());

        let mut steps = Vec::with_capacity(plan.len());
        for (index, step) in plan.iter().enumerate() {
            if index > 0 && !self.pause.is_zero() {
                tracing::debug!("Sleeping {:?} before next request", self.pause);
                tokio::time::sleep(self.pause).await;
            }

            tracing::info!("▶ Step {}/{}: {}", index + 1, plan.len(), step.label);
            if let Some(text) = prompt_text(&step.request) {
                tracing::info!("Prompt: {}...", truncate_chars(text, PROMPT_PREVIEW_CHARS));
            }

            let completion = self.client.complete(&step.request).await?;
            tracing::info!("✓ Response received in {:.2}s", completion.elapsed.as_secs_f64());

            let report = self.probe.handle(index, step, completion).await?;
            steps.push(report);
        }

        let elapsed = start.elapsed();
        tracing::info!("✅ {} probe finished in {:.2}s", self.probe.name(), elapsed.as_secs_f64());

        Ok(ProbeReport {
            name: self.probe.name().to_string(),
            steps,
            elapsed,
        })
    }
}

/// user 訊息中的文字部分
fn prompt_text(request: &crate::domain::model::ChatRequest) -> Option<&str> {
    use crate::domain::model::{ContentPart, MessageContent, Role};

    let message = request.messages.iter().find(|m| m.role == Role::User)?;
    match &message.content {
        MessageContent::Text(text) => Some(text),
        MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::ImageUrl { .. } => None,
        }),
    }
}
