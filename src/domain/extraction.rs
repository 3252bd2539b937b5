//! 從模型文字回覆中取出 JSON，並整理成劇本的角色與分鏡。

use crate::domain::model::{CharacterSpec, FrameSpec};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const DEFAULT_GENDER: &str = "其他";
pub const DEFAULT_SHOT: &str = "中景";
pub const DEFAULT_CAMERA_ANGLE: &str = "平视";
pub const DEFAULT_CAMERA_MOVEMENT: &str = "固定";
pub const DEFAULT_DURATION_SECS: u32 = 3;
pub const CONTENT_PLACEHOLDER: &str = "(待补充画面描述)";

fn fenced_json() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)```json(.*?)```").expect("static regex is valid"))
}

/// 依序嘗試 ```json 區塊、第一個 `{` 到最後一個 `}` 的片段；都不是 JSON 時回傳 `None`
pub fn extract_json(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some(caps) = fenced_json().captures(text) {
        match serde_json::from_str(caps[1].trim()) {
            Ok(value) => return Some(value),
            Err(e) => tracing::debug!("Fenced JSON block did not parse: {}", e),
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// `{"<field>": [...]}` 或直接是陣列
fn list_field<'a>(reply: &'a Value, field: &str) -> &'a [Value] {
    reply
        .get(field)
        .unwrap_or(reply)
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// 第一個有內容的欄位；數字轉成文字
fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// 陣列或逗號分隔字串都攤平成清單
fn first_list(item: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        let list: Vec<String> = match item.get(*key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(text)) => split_names(text),
            _ => continue,
        };
        if !list.is_empty() {
            return list;
        }
    }
    Vec::new()
}

fn split_names(text: &str) -> Vec<String> {
    text.split([',', '，', '、'])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_number(item: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::Number(n) => n.as_f64().filter(|v| *v >= 1.0).map(|v| v.round() as u32),
        Value::String(text) => text.trim().parse::<u32>().ok().filter(|v| *v > 0),
        _ => None,
    })
}

/// 模型回覆的角色清單轉成 `CharacterSpec`；重名角色只保留第一個
pub fn normalize_roles(reply: &Value) -> Vec<CharacterSpec> {
    let mut seen = HashSet::new();
    let mut roles = Vec::new();

    for (i, item) in list_field(reply, "roles").iter().enumerate() {
        let name = first_text(item, &["name", "role"]).unwrap_or_else(|| format!("角色{}", i + 1));
        if !seen.insert(name.clone()) {
            tracing::debug!("Skipping duplicate role '{}'", name);
            continue;
        }

        let traits = first_list(item, &["traits", "attributes", "features"]);
        roles.push(CharacterSpec {
            key: format!("role_{}", roles.len() + 1),
            name,
            gender: Some(
                first_text(item, &["gender", "sex"]).unwrap_or_else(|| DEFAULT_GENDER.to_string()),
            ),
            age: first_text(item, &["age", "age_years"]),
            desc: first_text(item, &["desc", "summary", "description"]),
            traits: (!traits.is_empty()).then(|| traits.join(",")),
            prompt: None,
            backstory: first_text(item, &["backstory", "background", "bio"]),
            style_tags: first_list(item, &["styleTags", "styles", "tags"]),
        });
    }
    roles
}

/// 模型回覆的分鏡清單轉成 `FrameSpec`；缺少的欄位補上預設值
pub fn normalize_frames(reply: &Value) -> Vec<FrameSpec> {
    list_field(reply, "frames")
        .iter()
        .enumerate()
        .map(|(i, item)| FrameSpec {
            scene: first_number(item, &["scene", "scene_number"]).unwrap_or(i as u32 + 1),
            location: first_text(item, &["location"]),
            characters: first_list(item, &["character", "characters"]),
            shot: Some(
                first_text(item, &["shot", "shot_size", "shot_type"])
                    .unwrap_or_else(|| DEFAULT_SHOT.to_string()),
            ),
            content: first_text(item, &["content", "description", "visual"])
                .unwrap_or_else(|| CONTENT_PLACEHOLDER.to_string()),
            camera_angle: Some(
                first_text(item, &["cameraAngle", "angle"])
                    .unwrap_or_else(|| DEFAULT_CAMERA_ANGLE.to_string()),
            ),
            camera_movement: Some(
                first_text(item, &["cameraMovement", "movement", "camera_move"])
                    .unwrap_or_else(|| DEFAULT_CAMERA_MOVEMENT.to_string()),
            ),
            dialogue: first_text(item, &["dialogue", "lines", "audio"]),
            duration: Some(
                first_number(item, &["duration", "time", "seconds"]).unwrap_or(DEFAULT_DURATION_SECS),
            ),
        })
        .collect()
}
