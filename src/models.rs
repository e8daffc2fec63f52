use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use uuid::Uuid;

/// Category suggestions shown by the form. The picked value travels as a free
/// string; a user-typed custom category overrides it.
pub const SUGGESTED_CATEGORIES: [&str; 18] = [
    "AI", "Future Machines", "Technologies", "School", "Agriculture",
    "Electrical", "Girls / Women", "Educational", "India", "Psychology",
    "Business", "Job & Career", "Finance", "Motivation", "Marketing",
    "Startups", "Social Media", "Entertainment",
];

/// Upper bound for inline image uploads (the form advertises "up to 5MB").
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Hinglish,
    Hindi,
    Gujarati,
    English,
}

impl Language {
    pub const ALL: [Language; 4] =
        [Language::Hinglish, Language::Hindi, Language::Gujarati, Language::English];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Hinglish => "Hinglish",
            Language::Hindi => "Hindi",
            Language::Gujarati => "Gujarati",
            Language::English => "English",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "Kids (5–12)")]
    Kids,
    #[serde(rename = "Teens (13–19)")]
    Teens,
    #[default]
    #[serde(rename = "Youth (20–35)")]
    Youth,
    #[serde(rename = "Adults (35–60)")]
    Adults,
    #[serde(rename = "Seniors (60+)")]
    Seniors,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Kids,
        AgeGroup::Teens,
        AgeGroup::Youth,
        AgeGroup::Adults,
        AgeGroup::Seniors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Kids => "Kids (5–12)",
            AgeGroup::Teens => "Teens (13–19)",
            AgeGroup::Youth => "Youth (20–35)",
            AgeGroup::Adults => "Adults (35–60)",
            AgeGroup::Seniors => "Seniors (60+)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoType {
    Short,
    Medium,
    Long,
    #[default]
    Reels,
    #[serde(rename = "YouTube Short")]
    YouTubeShort,
    #[serde(rename = "TikTok style")]
    TikTokStyle,
}

impl VideoType {
    pub const ALL: [VideoType; 6] = [
        VideoType::Short,
        VideoType::Medium,
        VideoType::Long,
        VideoType::Reels,
        VideoType::YouTubeShort,
        VideoType::TikTokStyle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::Short => "Short",
            VideoType::Medium => "Medium",
            VideoType::Long => "Long",
            VideoType::Reels => "Reels",
            VideoType::YouTubeShort => "YouTube Short",
            VideoType::TikTokStyle => "TikTok style",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    YouTube,
    #[default]
    Instagram,
    Snapchat,
    Twitter,
    Facebook,
    TikTok,
    LinkedIn,
    Custom,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::YouTube,
        Platform::Instagram,
        Platform::Snapchat,
        Platform::Twitter,
        Platform::Facebook,
        Platform::TikTok,
        Platform::LinkedIn,
        Platform::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Snapchat => "Snapchat",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::TikTok => "TikTok",
            Platform::LinkedIn => "LinkedIn",
            Platform::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthCategory {
    #[serde(rename = "Mini (0–10 sec)")]
    Mini,
    #[default]
    #[serde(rename = "Short (10–30 sec)")]
    Short,
    #[serde(rename = "Medium (30–60 sec)")]
    Medium,
    #[serde(rename = "Long (60+ sec)")]
    Long,
}

impl LengthCategory {
    pub const ALL: [LengthCategory; 4] = [
        LengthCategory::Mini,
        LengthCategory::Short,
        LengthCategory::Medium,
        LengthCategory::Long,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthCategory::Mini => "Mini (0–10 sec)",
            LengthCategory::Short => "Short (10–30 sec)",
            LengthCategory::Medium => "Medium (30–60 sec)",
            LengthCategory::Long => "Long (60+ sec)",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRequest {
    pub topic: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub custom_category: Option<String>,
    #[serde(default)]
    pub age_group: AgeGroup,
    #[serde(default)]
    pub video_type: VideoType,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub length: LengthCategory,
    pub language: Language,
    #[serde(default)]
    pub thunder_mode: bool,
}

impl HookRequest {
    /// Effective category: a typed custom value wins over a picked suggestion.
    pub fn category_label(&self) -> &str {
        if let Some(custom) = &self.custom_category {
            if !custom.trim().is_empty() {
                return custom.trim();
            }
        }
        self.category.as_deref().unwrap_or("").trim()
    }
}

/// Semantic label the model attaches to each hook. The service is permissive,
/// so anything outside the known set is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookTag {
    Emotional,
    Curiosity,
    PatternInterrupt,
    Viral,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedHook {
    pub text: String,
    #[serde(rename = "type")]
    pub tag: HookTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookBatch {
    pub hooks: Vec<GeneratedHook>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub mime_type: String,
    pub data: Bytes,
    pub instruction: String,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditedImage {
    pub mime_type: String,
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

impl EditedImage {
    /// Self-describing form the browser can render or download directly.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub signed_in_at: DateTime<Utc>,
}
