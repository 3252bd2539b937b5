use crate::core::images::{encode_png_data_url, mentions_image_link, save_data_url, save_response_images};
use crate::domain::model::{
    CharacterSpec, ChatMessage, ChatRequest, Completion, ContentPart, StoryboardScript,
};
use crate::domain::ports::{PlannedRequest, Probe, StepReport, Storage};
use crate::domain::prompts;
use crate::utils::error::{ProbeError, Result};
use async_trait::async_trait;

pub const RESPONSE_FILE: &str = "response.json";
pub const STORYBOARD_RESPONSE_FILE: &str = "storyboard_response.json";

/// 回應原樣（pretty print、保留非 ASCII）寫入檔案
async fn save_response_json<S: Storage>(storage: &S, completion: &Completion, filename: &str) -> Result<String> {
    let json = serde_json::to_vec_pretty(&completion.raw)?;
    storage.write_file(filename, &json).await?;
    tracing::info!("✓ Full response saved: {}", storage.display_path(filename));
    Ok(filename.to_string())
}

/// 連通性測試：只確認端點回覆
pub struct ConnectivityProbe {
    model: String,
}

impl ConnectivityProbe {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Probe for ConnectivityProbe {
    fn name(&self) -> &str {
        "connectivity"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        Ok(vec![PlannedRequest {
            label: "connectivity check".to_string(),
            request: ChatRequest::new(
                self.model.clone(),
                prompts::CONNECTIVITY_SYSTEM,
                ChatMessage::user(prompts::CONNECTIVITY_USER),
            ),
        }])
    }

    async fn handle(&self, _index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let content = completion.response.content().to_string();

        println!("Model: {}", self.model);
        println!("Elapsed (s): {:.2}", completion.elapsed.as_secs_f64());
        println!("Response: {}", content);

        Ok(StepReport {
            label: step.label.clone(),
            content,
            artifacts: Vec::new(),
            image_count: 0,
            elapsed: completion.elapsed,
        })
    }
}

/// 單張圖片生成：保存完整回應與內嵌圖片
pub struct ImageProbe<S: Storage> {
    model: String,
    prompt: String,
    storage: S,
}

impl<S: Storage> ImageProbe<S> {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, storage: S) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            storage,
        }
    }
}

#[async_trait]
impl<S: Storage> Probe for ImageProbe<S> {
    fn name(&self) -> &str {
        "image"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        println!("{}", "-".repeat(60));
        println!("Testing image generation...");
        println!("Model: {}", self.model);
        println!("Prompt: {}", self.prompt);
        println!("{}", "-".repeat(60));

        Ok(vec![PlannedRequest {
            label: "image generation".to_string(),
            request: ChatRequest::new(
                self.model.clone(),
                prompts::IMAGE_SYSTEM,
                ChatMessage::user(prompts::image_user_prompt(&self.prompt)),
            ),
        }])
    }

    async fn handle(&self, _index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let content = completion.response.content().to_string();

        println!("\n✓ Success!");
        println!("Elapsed: {:.2}s", completion.elapsed.as_secs_f64());
        println!("\nResponse content:\n{}", content);

        let mut artifacts = vec![save_response_json(&self.storage, &completion, RESPONSE_FILE).await?];
        println!("\nFull response saved to: {}", self.storage.display_path(RESPONSE_FILE));

        let images = save_response_images(&self.storage, &completion.response, "image").await?;
        for image in &images {
            println!("Image saved to: {}", self.storage.display_path(image));
        }
        let image_count = images.len();
        artifacts.extend(images);

        if mentions_image_link(&content) {
            println!("\nHint: the response may contain an image link, see the content above");
        }
        println!("{}", "-".repeat(60));

        Ok(StepReport {
            label: step.label.clone(),
            content,
            artifacts,
            image_count,
            elapsed: completion.elapsed,
        })
    }
}

/// 為劇本中每個角色生成一張參考圖 `reference_<key>.png`
pub struct ReferenceProbe<S: Storage> {
    model: String,
    script: StoryboardScript,
    storage: S,
}

impl<S: Storage> ReferenceProbe<S> {
    pub fn new(model: impl Into<String>, script: StoryboardScript, storage: S) -> Self {
        Self {
            model: model.into(),
            script,
            storage,
        }
    }
}

#[async_trait]
impl<S: Storage> Probe for ReferenceProbe<S> {
    fn name(&self) -> &str {
        "references"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        if self.script.characters.is_empty() {
            return Err(ProbeError::ConfigError {
                message: "Storyboard script defines no characters to generate references for"
                    .to_string(),
            });
        }

        Ok(self
            .script
            .characters
            .iter()
            .map(|character| PlannedRequest {
                label: format!("reference image for {}", character.name),
                request: ChatRequest::new(
                    self.model.clone(),
                    prompts::reference_system(character),
                    ChatMessage::user(prompts::character_prompt(character)),
                ),
            })
            .collect())
    }

    async fn handle(&self, index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let character = &self.script.characters[index];
        let url = completion
            .response
            .image_urls()
            .first()
            .copied()
            .ok_or_else(|| ProbeError::NoImagesError {
                step: step.label.clone(),
            })?;

        let filename = character.reference_file();
        save_data_url(&self.storage, url, &filename).await?;
        println!("✓ Reference saved: {}", self.storage.display_path(&filename));

        Ok(StepReport {
            label: step.label.clone(),
            content: completion.response.content().to_string(),
            artifacts: vec![filename],
            image_count: 1,
            elapsed: completion.elapsed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoryboardMode {
    /// 一次請求生成全部分鏡
    #[default]
    Batch,
    /// 每個分鏡一次請求，只附上該分鏡角色的參考圖
    PerFrame,
}

/// 帶參考圖的分鏡生成
pub struct StoryboardProbe<S: Storage> {
    model: String,
    script: StoryboardScript,
    storage: S,
    mode: StoryboardMode,
}

impl<S: Storage> StoryboardProbe<S> {
    pub fn new(model: impl Into<String>, script: StoryboardScript, storage: S) -> Self {
        Self {
            model: model.into(),
            script,
            storage,
            mode: StoryboardMode::Batch,
        }
    }

    pub fn with_mode(mut self, mode: StoryboardMode) -> Self {
        self.mode = mode;
        self
    }

    /// 讀取已存在的參考圖並轉成 data URL；檔案不存在屬於前置條件失敗
    async fn reference_data_url(&self, character: &CharacterSpec) -> Result<String> {
        let filename = character.reference_file();
        if !self.storage.exists(&filename).await {
            return Err(ProbeError::MissingPrecondition {
                path: self.storage.display_path(&filename),
            });
        }
        let bytes = self.storage.read_file(&filename).await?;
        Ok(encode_png_data_url(&bytes))
    }

    async fn image_parts<'a, I>(&self, characters: I) -> Result<Vec<ContentPart>>
    where
        I: IntoIterator<Item = &'a CharacterSpec> + Send,
        I::IntoIter: Send,
    {
        let mut parts = Vec::new();
        for character in characters {
            parts.push(ContentPart::image_url(self.reference_data_url(character).await?));
        }
        Ok(parts)
    }

    async fn handle_batch(&self, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        let mut artifacts =
            vec![save_response_json(&self.storage, &completion, STORYBOARD_RESPONSE_FILE).await?];

        let images = save_response_images(&self.storage, &completion.response, "storyboard").await?;
        println!("Found {} image(s)", images.len());
        if images.is_empty() {
            tracing::warn!("Storyboard response contained no images");
        }
        let image_count = images.len();
        artifacts.extend(images);

        Ok(StepReport {
            label: step.label.clone(),
            content: completion.response.content().to_string(),
            artifacts,
            image_count,
            elapsed: completion.elapsed,
        })
    }

    async fn handle_frame(
        &self,
        index: usize,
        step: &PlannedRequest,
        completion: Completion,
    ) -> Result<StepReport> {
        let number = index + 1;
        let mut artifacts = vec![
            save_response_json(
                &self.storage,
                &completion,
                &format!("storyboard_{}_response.json", number),
            )
            .await?,
        ];

        // 回應檔在檢查圖片之前寫入
        let url = completion
            .response
            .image_urls()
            .first()
            .copied()
            .ok_or_else(|| ProbeError::NoImagesError {
                step: step.label.clone(),
            })?;
        let filename = format!("storyboard_{}.png", number);
        save_data_url(&self.storage, url, &filename).await?;
        artifacts.push(filename);

        Ok(StepReport {
            label: step.label.clone(),
            content: completion.response.content().to_string(),
            artifacts,
            image_count: 1,
            elapsed: completion.elapsed,
        })
    }
}

#[async_trait]
impl<S: Storage> Probe for StoryboardProbe<S> {
    fn name(&self) -> &str {
        "storyboard"
    }

    async fn plan(&self) -> Result<Vec<PlannedRequest>> {
        match self.mode {
            StoryboardMode::Batch => {
                let mut parts = vec![ContentPart::text(prompts::storyboard_prompt(&self.script))];
                parts.extend(self.image_parts(self.script.characters.iter()).await?);
                tracing::info!(
                    "Storyboard request: {} frame(s), {} reference image(s)",
                    self.script.frames.len(),
                    parts.len() - 1
                );

                Ok(vec![PlannedRequest {
                    label: format!("storyboard with {} frames", self.script.frames.len()),
                    request: ChatRequest::new(
                        self.model.clone(),
                        prompts::STORYBOARD_SYSTEM,
                        ChatMessage::user_parts(parts),
                    ),
                }])
            }
            StoryboardMode::PerFrame => {
                let mut planned = Vec::with_capacity(self.script.frames.len());
                for frame in &self.script.frames {
                    let references = prompts::frame_references(frame, &self.script);
                    let mut parts = vec![ContentPart::text(prompts::frame_prompt(frame, &self.script))];
                    parts.extend(self.image_parts(references).await?);

                    planned.push(PlannedRequest {
                        label: format!("storyboard frame {}", frame.scene),
                        request: ChatRequest::new(
                            self.model.clone(),
                            prompts::FRAME_SYSTEM,
                            ChatMessage::user_parts(parts),
                        ),
                    });
                }
                Ok(planned)
            }
        }
    }

    async fn handle(&self, index: usize, step: &PlannedRequest, completion: Completion) -> Result<StepReport> {
        match self.mode {
            StoryboardMode::Batch => self.handle_batch(step, completion).await,
            StoryboardMode::PerFrame => self.handle_frame(index, step, completion).await,
        }
    }
}
