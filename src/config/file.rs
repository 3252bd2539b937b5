use crate::config::{EnvProfile, FlowKind, MAX_TIMEOUT_SECS};
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 選用的 TOML 設定檔，提供內建預設值以外的預設
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub openrouter: Option<ProfileSection>,
    pub nanobanana: Option<ProfileSection>,
    pub output: Option<OutputSection>,
    pub timeouts: Option<TimeoutSection>,
}

/// API key 只從環境變數讀取，設定檔中出現 `api_key` 視為錯誤
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileSection {
    pub base_url: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    pub dir: Option<String>,
    pub pause_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutSection {
    pub connectivity: Option<u64>,
    pub image: Option<u64>,
    pub reference: Option<u64>,
    pub storyboard: Option<u64>,
    pub extraction: Option<u64>,
}

impl FileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| ProbeError::ConfigError {
            message: format!("Cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ProbeError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn profile(&self, profile: EnvProfile) -> Option<&ProfileSection> {
        match profile {
            EnvProfile::OpenRouter => self.openrouter.as_ref(),
            EnvProfile::NanoBanana => self.nanobanana.as_ref(),
        }
    }

    pub fn timeout_secs(&self, flow: FlowKind) -> Option<u64> {
        let timeouts = self.timeouts.as_ref()?;
        match flow {
            FlowKind::Connectivity => timeouts.connectivity,
            FlowKind::Image => timeouts.image,
            FlowKind::Reference => timeouts.reference,
            FlowKind::Storyboard => timeouts.storyboard,
            FlowKind::Extraction => timeouts.extraction,
        }
    }

    pub fn output_dir(&self) -> Option<&str> {
        self.output.as_ref()?.dir.as_deref()
    }

    pub fn pause_secs(&self) -> Option<u64> {
        self.output.as_ref()?.pause_secs
    }
}

impl Validate for FileConfig {
    fn validate(&self) -> Result<()> {
        for (name, section) in [("openrouter", &self.openrouter), ("nanobanana", &self.nanobanana)] {
            if let Some(url) = section.as_ref().and_then(|s| s.base_url.as_deref()) {
                validate_url(&format!("{}.base_url", name), url)?;
            }
        }

        if let Some(timeouts) = &self.timeouts {
            let entries = [
                ("timeouts.connectivity", timeouts.connectivity),
                ("timeouts.image", timeouts.image),
                ("timeouts.reference", timeouts.reference),
                ("timeouts.storyboard", timeouts.storyboard),
                ("timeouts.extraction", timeouts.extraction),
            ];
            for (field, value) in entries {
                if let Some(secs) = value {
                    validate_range(field, secs, 1, MAX_TIMEOUT_SECS)?;
                }
            }
        }

        if let Some(pause) = self.pause_secs() {
            validate_range("output.pause_secs", pause, 0, 60)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[openrouter]
base_url = "https://proxy.example.com/v1/chat/completions"
model_id = "google/gemini-2.5-flash"

[nanobanana]
model_id = "google/gemini-2.5-flash-image"

[output]
dir = "./renders"
pause_secs = 5

[timeouts]
storyboard = 240
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.profile(EnvProfile::OpenRouter).unwrap().base_url.as_deref(),
            Some("https://proxy.example.com/v1/chat/completions")
        );
        assert_eq!(config.output_dir(), Some("./renders"));
        assert_eq!(config.pause_secs(), Some(5));
        assert_eq!(config.timeout_secs(FlowKind::Storyboard), Some(240));
        assert_eq!(config.timeout_secs(FlowKind::Image), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("IMAGEGEN_PROBE_TEST_MODEL", "env/model");

        let config = FileConfig::from_toml_str(
            r#"
[nanobanana]
model_id = "${IMAGEGEN_PROBE_TEST_MODEL}"
base_url = "${IMAGEGEN_PROBE_TEST_UNSET_URL}"
"#,
        )
        .unwrap();

        let section = config.profile(EnvProfile::NanoBanana).unwrap();
        assert_eq!(section.model_id.as_deref(), Some("env/model"));
        assert_eq!(section.base_url.as_deref(), Some("${IMAGEGEN_PROBE_TEST_UNSET_URL}"));

        std::env::remove_var("IMAGEGEN_PROBE_TEST_MODEL");
    }

    #[test]
    fn test_config_validation() {
        let config = FileConfig::from_toml_str(
            r#"
[timeouts]
image = 0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = FileConfig::from_toml_str(
            r#"
[openrouter]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[output]\ndir = \"out\"\n").unwrap();

        let config = FileConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output_dir(), Some("out"));
    }

    #[test]
    fn test_api_key_in_file_is_rejected() {
        let err = FileConfig::from_toml_str("[nanobanana]\napi_key = \"sk-from-file\"\n").unwrap_err();
        match &err {
            ProbeError::ConfigError { message } => assert!(message.contains("api_key")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = FileConfig::from_toml_str("[output\n").unwrap_err();
        assert!(matches!(err, ProbeError::ConfigError { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
