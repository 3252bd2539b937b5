//! 參考圖與分鏡的提示詞組裝。

use crate::domain::model::{CharacterSpec, FrameSpec, StoryboardScript};
use regex::Regex;
use std::sync::OnceLock;

pub const CONNECTIVITY_SYSTEM: &str = "你是一个分镜助手，只返回简短的确认信息。";
pub const CONNECTIVITY_USER: &str = "测试连通性，请返回：OK + 当前模型名";

pub const IMAGE_SYSTEM: &str = "你是一个图片生成助手。";
pub const DEFAULT_IMAGE_PROMPT: &str = "请生成一张美丽的日落海滩场景,包含椰树和海浪,风格为写实摄影";

pub const REFERENCE_SYSTEM: &str = "你是专业的图片生成助手。";
pub const CHARACTER_DESIGN_SYSTEM: &str = "你是专业的角色设计师,擅长创作一致的角色形象。";
pub const STORYBOARD_SYSTEM: &str = "你是专业的分镜画师,擅长创作连贯的视觉故事。";
pub const FRAME_SYSTEM: &str = "你是专业的分镜画师。";

pub const ROLE_EXTRACTION_SYSTEM: &str = r#"你是专业的剧本分析助手。从剧本中提取所有角色信息。

【输出格式】
只返回JSON对象，格式: {"roles": Character[]}

【Character对象字段】（所有字段都必须填写）
- name: string - 角色名称
- age: string - 年龄或年龄段(例如"25"、"30岁左右"、"中年")
- gender: string - 性别("男"、"女"或"其他")
- desc: string - 外观描述(发型、着装、体型等可视化特征，30-100字)
- traits: string - 性格特征标签(例如"冷酷,敏捷,果断")
- backstory: string - 背景故事(简要说明角色背景，20-50字)
- styleTags: string[] - 风格标签数组(例如["写实","黑色电影"])

【提取要求】
1. 从剧本中识别所有出现的角色
2. 根据剧本内容推断角色信息（年龄、性别、外貌等）
3. desc字段必须是外观描述，不要包含性格和背景
4. 如果剧本中某些信息不明确，根据上下文合理推断
5. styleTags根据剧本整体风格判断
6. 所有字段都不能为空，必须有内容"#;

const STORYBOARD_SPLIT_HEAD: &str = r#"你是专业的分镜师。根据剧本拆分出详细的分镜列表。

【输出格式】
只返回JSON对象，格式: {"frames": StoryboardFrame[]}

【StoryboardFrame对象字段】（所有字段都必须合理填写）
- scene: string - 场号(从1开始递增)
- shot: string - 景别，必须从以下选项选择："特写"、"近景"、"中景"、"全景"、"远景"
- character: string - 角色名(多个用逗号分隔,无角色留空)，必须使用提供的角色名
- cameraAngle: string - 机位角度，必须从以下选项选择："平视"、"俯视"、"仰视"、"倾斜"
- cameraMovement: string - 运镜方式，必须从以下选项选择："固定"、"推进"、"拉远"、"跟随"、"摇镜"、"升降"
- content: string - 画面描述(30-80字，描述画面中的视觉元素、光线、氛围等，不要包含运镜和景别信息)
- dialogue: string - 台词或音效(如果没有台词,描述环境音效，如"雨声"、"脚步声"等)
- duration: number - 时长(秒)，一般3-8秒，根据内容复杂度和节奏合理设置

【拆分要求】
1. 根据剧本内容和节奏，合理拆分为5-15个镜头
2. 景别要有变化，避免全部使用同一景别
3. 运镜要符合剧情节奏，重要时刻可用推进/拉远，快节奏用跟随
4. 角度要符合情绪表达，紧张用仰视，压抑用俯视
5. content字段是纯画面描述，不要写"特写"、"平视"这些技术参数
6. 时长要合理，对话镜头5-8秒，动作镜头3-5秒，氛围镜头可到8-10秒
7. 必须使用提供的角色名，不要自己创造新角色"#;

const AGE_MARKERS: [&str; 5] = ["岁", "左右", "中年", "青年", "老年"];

fn non_visual_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("性格|背景|经历|故事|心理|情感|独居|工作|职业").expect("static regex is valid")
    })
}

pub fn image_user_prompt(prompt: &str) -> String {
    format!("图片生成提示词: {}", prompt)
}

/// 指定 `prompt` 時沿用通用指令，由角色欄位組裝時改用角色設計師指令
pub fn reference_system(character: &CharacterSpec) -> &'static str {
    if explicit_prompt(character).is_some() {
        REFERENCE_SYSTEM
    } else {
        CHARACTER_DESIGN_SYSTEM
    }
}

fn explicit_prompt(character: &CharacterSpec) -> Option<&str> {
    character.prompt.as_deref().filter(|p| !p.trim().is_empty())
}

/// 角色參考圖提示詞；`prompt` 欄位存在時直接使用
pub fn character_prompt(character: &CharacterSpec) -> String {
    if let Some(prompt) = explicit_prompt(character) {
        return prompt.to_string();
    }

    let mut parts: Vec<String> = Vec::new();

    let mut details = Vec::new();
    if let Some(gender) = non_blank(&character.gender).filter(|g| *g != "其他") {
        details.push(gender.to_string());
    }
    if let Some(age) = non_blank(&character.age) {
        if AGE_MARKERS.iter().any(|m| age.contains(m)) {
            details.push(age.to_string());
        } else {
            details.push(format!("{}岁", age));
        }
    }

    let name = if character.name.trim().is_empty() {
        "角色"
    } else {
        character.name.as_str()
    };
    let basic_info = if details.is_empty() {
        name.to_string()
    } else {
        format!("{}, {}", name, details.join(", "))
    };
    parts.push(format!("生成角色参考图: {}", basic_info));
    parts.push(String::new());

    let desc = non_blank(&character.desc);
    if let Some(desc) = desc {
        let appearance = visual_description(desc);
        if !appearance.is_empty() {
            parts.push("【外观特征】".to_string());
            parts.push(appearance);
            parts.push(String::new());
        }
    } else if let Some(traits) = non_blank(&character.traits) {
        parts.push("【参考特征】".to_string());
        parts.push(traits.to_string());
        parts.push(String::new());
    }

    parts.push("【生成要求】".to_string());
    parts.push("- 风格: 写实摄影".to_string());
    parts.push("- 角度: 正面或3/4侧面肖像".to_string());
    parts.push("- 重点: 清晰的面部特征和整体形象".to_string());
    parts.push("- 背景: 简洁纯色或虚化背景".to_string());
    parts.push("- 只生成一个人物肖像".to_string());

    parts.join("\n")
}

/// 去掉描述中性格、背景等非視覺的分句
fn visual_description(desc: &str) -> String {
    let pattern = non_visual_pattern();
    if !pattern.is_match(desc) {
        return desc.to_string();
    }

    desc.split([',', '，', '。'])
        .filter(|s| !s.is_empty() && !pattern.is_match(s))
        .collect::<Vec<_>>()
        .join("，")
}

/// 一次請求生成全部分鏡的提示詞，參考圖依角色順序附在文字之後
pub fn storyboard_prompt(script: &StoryboardScript) -> String {
    let mut lines = vec![
        format!(
            "你是专业的分镜画师。请根据以下设定生成{}张连续的分镜图片。",
            script.frames.len()
        ),
        String::new(),
    ];

    if !script.characters.is_empty() {
        lines.push("【人物设定】".to_string());
        for (i, character) in script.characters.iter().enumerate() {
            lines.push(format!(
                "{}. {}: 参考下方第{}张图片,保持外貌一致",
                i + 1,
                character.name,
                i + 1
            ));
        }
        lines.push(String::new());
    }

    lines.push("【整体风格】".to_string());
    lines.push(format!("- {}风格", script.style));
    lines.push(format!("- 画面比例: {}", script.aspect_ratio));
    if let Some(atmosphere) = non_blank(&script.atmosphere) {
        lines.push(format!("- {}", atmosphere));
    }
    lines.push(String::new());

    lines.push("【分镜列表】".to_string());
    for frame in &script.frames {
        let mut header = format!("第{}镜 [", frame.scene);
        let mut tags = Vec::new();
        if let Some(location) = non_blank(&frame.location) {
            tags.push(format!("场景:{}", location));
        }
        if !frame.characters.is_empty() {
            tags.push(format!("人物:{}", frame.characters.join("+")));
        }
        header.push_str(&tags.join(","));
        header.push(']');
        lines.push(header);
        lines.push(frame.content.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// 單一分鏡的提示詞
pub fn frame_prompt(frame: &FrameSpec, script: &StoryboardScript) -> String {
    let mut lines = vec![
        "你是专业的分镜画师。请生成分镜图片。".to_string(),
        String::new(),
        "【整体风格】".to_string(),
        format!("- 风格: {}", script.style),
        format!("- 比例: {}", script.aspect_ratio),
        String::new(),
        format!("【场景 {}】", frame.scene),
    ];

    if let Some(location) = non_blank(&frame.location) {
        lines.push(format!("地点: {}", location));
    }
    if !frame.characters.is_empty() {
        lines.push(format!("角色: {}", frame.characters.join(",")));
    }
    if let Some(shot) = non_blank(&frame.shot) {
        lines.push(format!("景别: {}", shot));
    }
    lines.push(String::new());
    lines.push(frame.content.clone());

    lines.join("\n")
}

/// 分鏡中出場且在劇本裡有設定的角色，依分鏡列出的順序
pub fn frame_references<'a>(frame: &FrameSpec, script: &'a StoryboardScript) -> Vec<&'a CharacterSpec> {
    frame
        .characters
        .iter()
        .filter_map(|name| script.character(name.trim()))
        .collect()
}

pub fn role_extraction_user(screenplay: &str) -> String {
    format!("请从以下剧本中提取所有角色信息:\n\n{}", screenplay)
}

/// 拆分鏡頭的 system 指令：固定規則加上畫幅、風格與可用角色
pub fn storyboard_split_system(aspect_ratio: &str, style: &str, roles: &[CharacterSpec]) -> String {
    let mut lines = vec![
        STORYBOARD_SPLIT_HEAD.to_string(),
        String::new(),
        "【风格和比例】".to_string(),
        format!("- 画幅比例: {}", aspect_ratio),
        format!("- 整体风格: {}", style),
        String::new(),
        "【可用角色】".to_string(),
    ];
    lines.extend(roles.iter().map(|r| format!("- {}", r.name)));
    lines.join("\n")
}

pub fn storyboard_split_user(screenplay: &str) -> String {
    format!("请根据以下剧本拆分分镜:\n\n{}", screenplay)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
