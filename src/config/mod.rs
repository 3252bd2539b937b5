#[cfg(feature = "cli")]
pub mod cli;
pub mod file;
pub mod script;

use crate::domain::ports::ApiSettings;
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, validate_url, Validate};
use file::FileConfig;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OUTPUT_DIR: &str = "test/out";
pub const DEFAULT_PAUSE_SECS: u64 = 2;
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// 環境變數組：文字模型（連通性測試、劇本拆解）用 OPENROUTER_*，圖片生成用 NANOBANANA_*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvProfile {
    OpenRouter,
    NanoBanana,
}

impl EnvProfile {
    pub fn prefix(self) -> &'static str {
        match self {
            EnvProfile::OpenRouter => "OPENROUTER",
            EnvProfile::NanoBanana => "NANOBANANA",
        }
    }

    pub fn api_key_var(self) -> String {
        format!("{}_API_KEY", self.prefix())
    }

    pub fn base_url_var(self) -> String {
        format!("{}_BASE_URL", self.prefix())
    }

    pub fn model_id_var(self) -> String {
        format!("{}_MODEL_ID", self.prefix())
    }

    pub fn default_model(self) -> &'static str {
        match self {
            EnvProfile::OpenRouter => "google/gemini-2.5-flash",
            EnvProfile::NanoBanana => "google/gemini-2.5-flash-image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Connectivity,
    Image,
    Reference,
    Storyboard,
    Extraction,
}

impl FlowKind {
    pub fn profile(self) -> EnvProfile {
        match self {
            FlowKind::Connectivity | FlowKind::Extraction => EnvProfile::OpenRouter,
            _ => EnvProfile::NanoBanana,
        }
    }

    pub fn default_timeout_secs(self) -> u64 {
        match self {
            FlowKind::Connectivity => 30,
            FlowKind::Image => 60,
            FlowKind::Reference => 120,
            FlowKind::Storyboard => 180,
            FlowKind::Extraction => 120,
        }
    }

    /// 錯誤訊息中保留的回應字元數
    pub fn body_preview_chars(self) -> usize {
        match self {
            FlowKind::Connectivity => 300,
            _ => crate::utils::error::BODY_PREVIEW_CHARS,
        }
    }
}

/// 命令列上明確指定的值，優先於環境變數與設定檔
#[derive(Debug, Clone, Default)]
pub struct ApiOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub flow: FlowKind,
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub timeout: Duration,
}

impl ProbeSettings {
    /// 解析順序：命令列 > 環境變數 > 設定檔 > 內建預設。API key 只來自環境變數，缺少時直接失敗，不發出任何請求
    pub fn resolve_with<F>(
        flow: FlowKind,
        lookup: F,
        file: Option<&FileConfig>,
        overrides: &ApiOverrides,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = flow.profile();
        let section = file.and_then(|f| f.profile(profile));
        let env = |name: String| lookup(&name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = env(profile.api_key_var()).ok_or_else(|| ProbeError::MissingApiKey {
            env_var: profile.api_key_var(),
        })?;

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| env(profile.base_url_var()))
            .or_else(|| section.and_then(|s| usable(&s.base_url)))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model_id = overrides
            .model
            .clone()
            .or_else(|| env(profile.model_id_var()))
            .or_else(|| section.and_then(|s| usable(&s.model_id)))
            .unwrap_or_else(|| profile.default_model().to_string());

        let timeout_secs = overrides
            .timeout_secs
            .or_else(|| file.and_then(|f| f.timeout_secs(flow)))
            .unwrap_or_else(|| flow.default_timeout_secs());

        let settings = Self {
            flow,
            api_key,
            base_url,
            model_id,
            timeout: Duration::from_secs(timeout_secs),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// 設定檔中尚未替換的 `${VAR}` 視同未設定
fn usable(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')))
        .map(str::to_string)
}

impl ApiSettings for ProbeSettings {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Validate for ProbeSettings {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_non_empty_string("model_id", &self.model_id)?;
        validate_range("timeout_secs", self.timeout.as_secs(), 1, MAX_TIMEOUT_SECS)?;
        Ok(())
    }
}
