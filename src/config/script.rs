use crate::domain::model::StoryboardScript;
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{validate_file_key, validate_non_empty_string, Validate};
use std::collections::HashSet;
use std::path::Path;

/// 讀取分鏡劇本；未指定路徑時使用內建劇本
pub fn load_script(path: Option<&Path>) -> Result<StoryboardScript> {
    let script = match path {
        Some(path) => {
            tracing::info!("📁 Loading storyboard script from: {}", path.display());
            let content = std::fs::read_to_string(path).map_err(|e| ProbeError::ConfigError {
                message: format!("Cannot read {}: {}", path.display(), e),
            })?;
            parse_script(&content)?
        }
        None => StoryboardScript::default(),
    };
    script.validate()?;
    Ok(script)
}

pub fn parse_script(content: &str) -> Result<StoryboardScript> {
    toml::from_str(content).map_err(|e| ProbeError::ConfigError {
        message: format!("Storyboard script parsing error: {}", e),
    })
}

/// 序列化成 `load_script` 可讀回的 TOML
pub fn render_script(script: &StoryboardScript) -> Result<String> {
    toml::to_string_pretty(script).map_err(|e| ProbeError::ConfigError {
        message: format!("Storyboard script serialization error: {}", e),
    })
}

impl Validate for StoryboardScript {
    fn validate(&self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(ProbeError::ConfigError {
                message: "Storyboard script has no frames".to_string(),
            });
        }

        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for character in &self.characters {
            validate_file_key("characters.key", &character.key)?;
            validate_non_empty_string("characters.name", &character.name)?;
            if !keys.insert(character.key.as_str()) {
                return Err(ProbeError::InvalidConfigValueError {
                    field: "characters.key".to_string(),
                    value: character.key.clone(),
                    reason: "Duplicate character key".to_string(),
                });
            }
            if !names.insert(character.name.as_str()) {
                return Err(ProbeError::InvalidConfigValueError {
                    field: "characters.name".to_string(),
                    value: character.name.clone(),
                    reason: "Duplicate character name".to_string(),
                });
            }
        }

        for frame in &self.frames {
            validate_non_empty_string(&format!("frames[{}].content", frame.scene), &frame.content)?;
            for name in &frame.characters {
                if self.character(name.trim()).is_none() {
                    tracing::warn!(
                        "Frame {} names unknown character '{}', no reference image will be attached",
                        frame.scene,
                        name
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
style = "水彩插画"
aspect_ratio = "4:3"

[[characters]]
key = "boy"
name = "小明"
gender = "男"
age = "10"
desc = "短发,蓝色背包"

[[frames]]
scene = 1
location = "操场"
characters = ["小明"]
shot = "远景"
content = "小明在操场上奔跑。"

[[frames]]
scene = 2
content = "夕阳下的空操场。"
"#;

    #[test]
    fn test_parse_script() {
        let script = parse_script(SCRIPT).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.style, "水彩插画");
        assert_eq!(script.aspect_ratio, "4:3");
        assert_eq!(script.atmosphere, None);
        assert_eq!(script.characters[0].reference_file(), "reference_boy.png");
        assert_eq!(script.frames.len(), 2);
        assert!(script.frames[1].characters.is_empty());
    }

    #[test]
    fn test_defaults_applied() {
        let script = parse_script("[[frames]]\nscene = 1\ncontent = \"x\"\n").unwrap();
        assert_eq!(script.style, "写实摄影");
        assert_eq!(script.aspect_ratio, "16:9");
    }

    #[test]
    fn test_builtin_script_is_valid() {
        let script = load_script(None).unwrap();
        assert_eq!(script.characters.len(), 2);
        assert_eq!(script.frames.len(), 3);
    }

    #[test]
    fn test_rejects_bad_scripts() {
        assert!(parse_script("style = \"x\"\n").unwrap().validate().is_err());

        let duplicate = r#"
[[characters]]
key = "a"
name = "A"

[[characters]]
key = "a"
name = "B"

[[frames]]
scene = 1
content = "x"
"#;
        assert!(parse_script(duplicate).unwrap().validate().is_err());

        let bad_key = r#"
[[characters]]
key = "../a"
name = "A"

[[frames]]
scene = 1
content = "x"
"#;
        assert!(parse_script(bad_key).unwrap().validate().is_err());
    }

    #[test]
    fn test_rendered_script_loads_back() {
        let mut script = StoryboardScript::default();
        script.characters[0].style_tags = vec!["写实".to_string(), "悬疑".to_string()];
        script.frames[0].camera_angle = Some("俯视".to_string());
        script.frames[0].duration = Some(6);

        let rendered = render_script(&script).unwrap();
        let loaded = parse_script(&rendered).unwrap();
        assert!(loaded.validate().is_ok());
        assert_eq!(loaded, script);
    }
}
