use crate::config::script::render_script;
use crate::domain::extraction::{extract_json, normalize_frames, normalize_roles};
use crate::domain::model::{CharacterSpec, ChatMessage, ChatRequest, Completion, StoryboardScript};
use crate::domain::ports::{PlannedRequest, Probe, StepReport, Storage};
use crate::domain::prompts;
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const DEFAULT_SCRIPT_FILE: &str = "script.toml";

const NOT_JSON: &str = "Reply content is not JSON";

fn reply_json(step: &PlannedRequest, completion: &Completion) -> Result<serde_json::Value> {
    let content = completion.response.content();
    extract_json(content).ok_or_else(|| ProbeError::extraction(&step.label, NOT_JSON, content))
}

/// 從劇本文字中找出角色；結果以 `roles()` 取回，供下一步拆分鏡頭使用
pub struct RoleExtractionProbe {
    model: String,
    screenplay: String,
    roles: Mutex<Vec<CharacterSpec>>,
}

impl RoleExtractionProbe {
    pub fn new(model: impl Into<String>, screenplay: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            screenplay: screenplay.into(),
            roles: Mutex::new(Vec::new()),
        }
    }

    pub async fn roles(&self) -> Vec<CharacterSpec> {
        self.roles.lock().await.clone()
    }
}

#[async_trait]
impl Probe for RoleExtractionProbe {
    fn name(&self) -> &str {
        "role extraction"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        Ok(vec![PlannedRequest {
            label: "role extraction".to_string(),
            request: ChatRequest::new(
                self.model.clone(),
                prompts::ROLE_EXTRACTION_SYSTEM,
                ChatMessage::user(prompts::role_extraction_user(&self.screenplay)),
            )
            .with_json_output(),
        }])
    }

    async fn handle(&self, _index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let roles = normalize_roles(&reply_json(step, &completion)?);
        if roles.is_empty() {
            tracing::warn!("No roles found in the screenplay");
        }
        for role in &roles {
            println!("Role: {} ({})", role.name, role.key);
        }

        *self.roles.lock().await = roles;

        Ok(StepReport {
            label: step.label.clone(),
            content: completion.response.content().to_string(),
            artifacts: Vec::new(),
            image_count: 0,
            elapsed: completion.elapsed,
        })
    }
}

/// 依角色清單拆出分鏡，寫成可供 `--script` 使用的劇本檔
pub struct FrameSplitProbe<S: Storage> {
    model: String,
    screenplay: String,
    script: StoryboardScript,
    storage: S,
    output_file: String,
}

impl<S: Storage> FrameSplitProbe<S> {
    /// `script` 提供風格、畫幅與角色，分鏡由回覆填入
    pub fn new(
        model: impl Into<String>,
        screenplay: impl Into<String>,
        script: StoryboardScript,
        storage: S,
    ) -> Self {
        Self {
            model: model.into(),
            screenplay: screenplay.into(),
            script,
            storage,
            output_file: DEFAULT_SCRIPT_FILE.to_string(),
        }
    }

    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = output_file.into();
        self
    }
}

#[async_trait]
impl<S: Storage> Probe for FrameSplitProbe<S> {
    fn name(&self) -> &str {
        "storyboard split"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        Ok(vec![PlannedRequest {
            label: "storyboard split".to_string(),
            request: ChatRequest::new(
                self.model.clone(),
                prompts::storyboard_split_system(
                    &self.script.aspect_ratio,
                    &self.script.style,
                    &self.script.characters,
                ),
                ChatMessage::user(prompts::storyboard_split_user(&self.screenplay)),
            )
            .with_json_output(),
        }])
    }

    async fn handle(&self, _index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let frames = normalize_frames(&reply_json(step, &completion)?);
        if frames.is_empty() {
            return Err(ProbeError::extraction(
                &step.label,
                "Reply contains no frames",
                completion.response.content(),
            ));
        }

        let script = StoryboardScript {
            frames,
            ..self.script.clone()
        };
        script.validate()?;

        self.storage
            .write_file(&self.output_file, render_script(&script)?.as_bytes())
            .await?;
        println!(
            "✓ Script with {} character(s) and {} frame(s) saved: {}",
            script.characters.len(),
            script.frames.len(),
            self.storage.display_path(&self.output_file)
        );

        Ok(StepReport {
            label: step.label.clone(),
            content: completion.response.content().to_string(),
            artifacts: vec![self.output_file.clone()],
            image_count: 0,
            elapsed: completion.elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::script::parse_script;
    use crate::domain::model::ChatResponse;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MemoryStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.lock().await.get(path).cloned().ok_or_else(|| {
                ProbeError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }

        fn display_path(&self, path: &str) -> String {
            format!("memory/{}", path)
        }
    }

    fn reply(content: &str) -> Completion {
        let raw = serde_json::json!({"choices": [{"message": {"content": content}}]});
        Completion {
            response: ChatResponse::from_raw(&raw),
            raw,
            elapsed: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_role_request_asks_for_json() {
        let probe = RoleExtractionProbe::new("text/model", "第一场 雨夜");
        let plan = probe.plan().await.unwrap();

        let body = serde_json::to_value(&plan[0].request).unwrap();
        assert_eq!(body["temperature"], serde_json::json!(0.2));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], prompts::ROLE_EXTRACTION_SYSTEM);
        assert!(body["messages"][1]["content"].as_str().unwrap().ends_with("第一场 雨夜"));
    }

    #[tokio::test]
    async fn test_roles_are_kept_for_the_next_step() {
        let probe = RoleExtractionProbe::new("m", "x");
        let plan = probe.plan().await.unwrap();

        probe
            .handle(0, &plan[0], reply("```json\n{\"roles\": [{\"name\": \"阿青\", \"gender\": \"女\"}]}\n```"))
            .await
            .unwrap();

        let roles = probe.roles().await;
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "阿青");
        assert_eq!(roles[0].key, "role_1");
    }

    #[tokio::test]
    async fn test_role_reply_without_json_fails() {
        let probe = RoleExtractionProbe::new("m", "x");
        let plan = probe.plan().await.unwrap();

        let err = probe.handle(0, &plan[0], reply("抱歉，我无法处理。")).await.unwrap_err();
        match &err {
            ProbeError::ExtractionError { step, content, .. } => {
                assert_eq!(step, "role extraction");
                assert_eq!(content, "抱歉，我无法处理。");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.exit_code(), 1);
        assert!(probe.roles().await.is_empty());
    }

    #[tokio::test]
    async fn test_frame_split_writes_loadable_script() {
        let storage = MemoryStorage::default();
        let template = StoryboardScript {
            style: "水彩插画".to_string(),
            aspect_ratio: "4:3".to_string(),
            atmosphere: None,
            characters: normalize_roles(&serde_json::json!({"roles": [{"name": "阿青"}]})),
            frames: Vec::new(),
        };
        let probe = FrameSplitProbe::new("m", "x", template, storage.clone()).with_output_file("rain.toml");
        let plan = probe.plan().await.unwrap();

        let system = serde_json::to_value(&plan[0].request).unwrap()["messages"][0]["content"].clone();
        assert!(system.as_str().unwrap().ends_with("【可用角色】\n- 阿青"));

        let report = probe
            .handle(
                0,
                &plan[0],
                reply(r#"好的 {"frames": [{"scene": "1", "character": "阿青", "content": "雨夜窗边"}, {"content": "空街"}]}"#),
            )
            .await
            .unwrap();
        assert_eq!(report.artifacts, vec!["rain.toml"]);

        let saved = storage.read_file("rain.toml").await.unwrap();
        let script = parse_script(std::str::from_utf8(&saved).unwrap()).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.style, "水彩插画");
        assert_eq!(script.characters[0].reference_file(), "reference_role_1.png");
        assert_eq!(script.frames.len(), 2);
        assert_eq!(script.frames[0].characters, vec!["阿青"]);
        assert_eq!(script.frames[1].scene, 2);
    }

    #[tokio::test]
    async fn test_frame_split_without_frames_fails() {
        let storage = MemoryStorage::default();
        let probe = FrameSplitProbe::new("m", "x", StoryboardScript::default(), storage.clone());
        let plan = probe.plan().await.unwrap();

        let err = probe.handle(0, &plan[0], reply("{\"frames\": []}")).await.unwrap_err();
        assert!(matches!(err, ProbeError::ExtractionError { .. }));
        assert!(!storage.exists(DEFAULT_SCRIPT_FILE).await);
    }
}
