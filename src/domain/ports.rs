use crate::domain::model::{ChatRequest, Completion};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// 供使用者閱讀的完整路徑
    fn display_path(&self, path: &str) -> String;
}

pub trait ApiSettings: Send + Sync {
    fn api_key(&self) -> &str;
    fn base_url(&self) -> &str;
    fn model_id(&self) -> &str;
    fn timeout(&self) -> Duration;
}

/// 一個探測流程：先規劃要送出的請求，再逐一處理每個成功的回應
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn plan(&self) -> Result<Vec<PlannedRequest>>;

    /// `index` 是該請求在 `plan` 結果中的位置
    async fn handle(
        &self,
        index: usize,
        step: &PlannedRequest,
        completion: Completion,
    ) -> Result<StepReport>;
}

#[derive(Debug, Clone)]
pub struct PlannedRequest {
    pub label: String,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub label: String,
    pub content: String,
    pub artifacts: Vec<String>,
    pub image_count: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    pub elapsed: Duration,
}

impl ProbeReport {
    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .flat_map(|s| s.artifacts.iter().map(String::as_str))
    }

    pub fn image_count(&self) -> usize {
        self.steps.iter().map(|s| s.image_count).sum()
    }
}
