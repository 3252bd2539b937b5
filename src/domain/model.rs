use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// 訊息內容：純文字，或文字與圖片混合的片段列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// 一條 system 指令加一條 user 訊息
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: ChatMessage) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::system(system), user],
            temperature: None,
            response_format: None,
        }
    }

    /// 要求模型以 JSON 物件回覆（低溫度）
    pub fn with_json_output(mut self) -> Self {
        self.temperature = Some(0.2);
        self.response_format = Some(ResponseFormat {
            kind: "json_object".to_string(),
        });
        self
    }
}

/// 第一個 choice 的文字與圖片。
///
/// 任何合法 JSON 都能轉成 `ChatResponse`：缺少、為 null 或形狀不符的欄位一律視為空值，
/// 只有無法解析成 JSON 的回應才算解碼失敗。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct ChatResponse {
    content: Option<String>,
    images: Vec<String>,
}

impl ChatResponse {
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        let message = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"));

        let content = message.and_then(|m| m.get("content")).and_then(render_content);
        let images = message
            .and_then(|m| m.get("images"))
            .and_then(|i| i.as_array())
            .map(|items| items.iter().filter_map(image_url_of).collect())
            .unwrap_or_default();

        Self { content, images }
    }

    /// 第一個 choice 的文字內容，缺少時為空字串
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn image_urls(&self) -> Vec<&str> {
        self.images.iter().map(String::as_str).collect()
    }
}

impl From<serde_json::Value> for ChatResponse {
    fn from(raw: serde_json::Value) -> Self {
        Self::from_raw(&raw)
    }
}

/// 字串原樣保留；片段陣列取出文字片段串接；其他值轉成 JSON 文字
fn render_content(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| match part {
                    serde_json::Value::String(text) => Some(text.as_str()),
                    _ => part.get("text").and_then(|t| t.as_str()),
                })
                .collect::<Vec<_>>()
                .join(""),
        ),
        other => Some(other.to_string()),
    }
}

/// `{"image_url": {"url": ...}}`，也接受 `{"image_url": "..."}`
fn image_url_of(item: &serde_json::Value) -> Option<String> {
    let image_url = item.get("image_url")?;
    image_url
        .get("url")
        .and_then(|u| u.as_str())
        .or_else(|| image_url.as_str())
        .map(str::to_string)
}

/// 一次成功呼叫的結果：型別化回應加上原始 JSON
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: ChatResponse,
    pub raw: serde_json::Value,
    pub elapsed: std::time::Duration,
}

/// 角色設定；`key` 決定參考圖檔名 `reference_<key>.png`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub traits: Option<String>,
    /// 直接指定參考圖提示詞，忽略其餘欄位
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_tags: Vec<String>,
}

impl CharacterSpec {
    pub fn reference_file(&self) -> String {
        format!("reference_{}.png", self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub scene: u32,
    #[serde(default)]
    pub location: Option<String>,
    /// 出場角色名稱，對應 `CharacterSpec::name`
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub shot: Option<String>,
    pub content: String,
    #[serde(default)]
    pub camera_angle: Option<String>,
    #[serde(default)]
    pub camera_movement: Option<String>,
    #[serde(default)]
    pub dialogue: Option<String>,
    /// 秒
    #[serde(default)]
    pub duration: Option<u32>,
}

pub const DEFAULT_STYLE: &str = "写实摄影";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryboardScript {
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub atmosphere: Option<String>,
    #[serde(default)]
    pub characters: Vec<CharacterSpec>,
    #[serde(default)]
    pub frames: Vec<FrameSpec>,
}

impl StoryboardScript {
    pub fn character(&self, name: &str) -> Option<&CharacterSpec> {
        self.characters.iter().find(|c| c.name == name)
    }
}

impl Default for StoryboardScript {
    /// 內建劇本：女主人與橘貓的午夜三鏡
    fn default() -> Self {
        Self {
            style: default_style(),
            aspect_ratio: default_aspect_ratio(),
            atmosphere: Some("夜晚氛围,昏暗的灯光".to_string()),
            characters: vec![
                CharacterSpec {
                    key: "woman".to_string(),
                    name: "女主人".to_string(),
                    prompt: Some(
                        "一位年轻的亚洲女性,长发,温柔的笑容,现代休闲装,写实摄影风格,高质量,细节丰富"
                            .to_string(),
                    ),
                    ..Default::default()
                },
                CharacterSpec {
                    key: "cat".to_string(),
                    name: "橘猫".to_string(),
                    prompt: Some(
                        "一只可爱的橘色猫咪,毛茸茸的,圆润的身材,温柔的表情,写实摄影风格,高质量,细节丰富"
                            .to_string(),
                    ),
                    ..Default::default()
                },
            ],
            frames: vec![
                FrameSpec {
                    scene: 1,
                    location: Some("走廊".to_string()),
                    characters: vec!["橘猫".to_string()],
                    shot: None,
                    content: "午夜过后,走廊的灯光昏暗,橘色的月光勾勒出每扇门门框的边缘。女主人的房门缝里掠过一团影子,她以为是邻居家的猫。".to_string(),
                    ..Default::default()
                },
                FrameSpec {
                    scene: 2,
                    location: Some("门口".to_string()),
                    characters: vec!["女主人".to_string()],
                    shot: None,
                    content: "女主人把耳朵贴在门上,楼下垃圾道里传来轻微的玻璃碰撞声,像某种小动物把自己关进了瓶子。".to_string(),
                    ..Default::default()
                },
                FrameSpec {
                    scene: 3,
                    location: Some("电梯".to_string()),
                    characters: vec!["女主人".to_string(), "橘猫".to_string()],
                    shot: None,
                    content: "女主人忽然想到傍晚看见的那只橘猫,它在电梯里待着,眼神里像在等一个还没到的人。".to_string(),
                    ..Default::default()
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_request_serialization() {
        let request = ChatRequest::new(
            "google/gemini-2.5-flash",
            "be brief",
            ChatMessage::user("ping"),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "google/gemini-2.5-flash",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "ping"}
                ]
            })
        );
    }

    #[test]
    fn test_multipart_request_serialization() {
        let request = ChatRequest::new(
            "google/gemini-2.5-flash-image",
            "storyboard artist",
            ChatMessage::user_parts(vec![
                ContentPart::text("draw three frames"),
                ContentPart::image_url("data:image/png;base64,AAAA"),
            ]),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["messages"][1]["content"],
            json!([
                {"type": "text", "text": "draw three frames"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ])
        );
    }

    #[test]
    fn test_response_with_images() {
        let raw = json!({
            "id": "gen-1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "here you go",
                    "images": [
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,BBBB"}}
                    ]
                }
            }]
        });

        let response: ChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.content(), "here you go");
        assert_eq!(
            response.image_urls(),
            vec!["data:image/png;base64,AAAA", "data:image/png;base64,BBBB"]
        );
    }

    #[test]
    fn test_response_missing_fields_defaults() {
        let response: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.content(), "");
        assert!(response.image_urls().is_empty());

        let response: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert_eq!(response.content(), "");
    }

    #[test]
    fn test_response_null_images_and_empty_message() {
        let response = ChatResponse::from_raw(&json!({
            "choices": [{"message": {"content": "here", "images": null}}]
        }));
        assert_eq!(response.content(), "here");
        assert!(response.image_urls().is_empty());

        let response = ChatResponse::from_raw(&json!({"choices": [{"message": {}}]}));
        assert_eq!(response.content(), "");

        let response = ChatResponse::from_raw(&json!({"choices": null}));
        assert_eq!(response.content(), "");
    }

    #[test]
    fn test_response_non_string_content() {
        let response = ChatResponse::from_raw(&json!({
            "choices": [{"message": {"content": [
                {"type": "text", "text": "OK "},
                {"type": "text", "text": "model"},
                {"type": "image_url", "image_url": {"url": "data:,"}}
            ]}}]
        }));
        assert_eq!(response.content(), "OK model");

        let response = ChatResponse::from_raw(&json!({
            "choices": [{"message": {"content": {"answer": 42}}}]
        }));
        assert_eq!(response.content(), "{\"answer\":42}");
    }

    #[test]
    fn test_response_skips_malformed_images() {
        let response = ChatResponse::from_raw(&json!({
            "choices": [{"message": {"images": [
                {"image_url": {"url": "data:image/png;base64,AAAA"}},
                {"image_url": null},
                "not an object",
                {"image_url": "data:image/png;base64,BBBB"}
            ]}}]
        }));
        assert_eq!(
            response.image_urls(),
            vec!["data:image/png;base64,AAAA", "data:image/png;base64,BBBB"]
        );
    }
}
