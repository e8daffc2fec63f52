use serde_json::{json, Value};

use crate::models::HookRequest;

pub const SYSTEM_INSTRUCTION: &str = "You are a world-class social media strategist and viral \
     content expert. Your only goal is to write hooks that stop the scroll.";

const TONE_STANDARD: &str =
    "The hooks should be: Emotional, curiosity-building, or pattern-interrupting.";

const TONE_THUNDER: &str = "THUNDER MODE ACTIVE: The hooks must be EXTREMELY HIGH-ENERGY, \
     SHOCKING, CONTROVERSIAL, and AGGRESSIVE. Use psychological triggers that make it \
     impossible to scroll past. Focus on intensity and immediate impact.";

/// Two-way tone switch. Exactly these two variants exist.
pub fn tone_directive(thunder_mode: bool) -> &'static str {
    if thunder_mode {
        TONE_THUNDER
    } else {
        TONE_STANDARD
    }
}

/// Natural-language instruction embedding every request field and the
/// 10-to-15 cardinality target. Pure transformation; the caller has already
/// rejected empty topics.
pub fn build_hook_prompt(req: &HookRequest) -> String {
    let platform = req.platform.as_str();
    format!(
        "Generate 10 to 15 viral social media hooks for a video with the following details:\n\
         - Topic: {topic}\n\
         - Category: {category}\n\
         - Target Audience: {age_group}\n\
         - Video Format: {video_type}\n\
         - Platform: {platform}\n\
         - Duration: {length}\n\
         - Language: {language} (CRITICAL: Output MUST be in this language)\n\
         \n\
         {tone}\n\
         \n\
         Optimized for the algorithm of {platform}.\n\
         Highly engaging and designed for maximum watch time.\n\
         \n\
         Return a JSON array of objects with 'text' (the hook itself), 'type' (e.g., emotional, \
         curiosity, viral), and 'explanation' (brief reason why it works).",
        topic = req.topic.trim(),
        category = req.category_label(),
        age_group = req.age_group.as_str(),
        video_type = req.video_type.as_str(),
        length = req.length.as_str(),
        language = req.language.as_str(),
        tone = tone_directive(req.thunder_mode),
    )
}

/// Structured-output constraint sent alongside the prompt: an array of
/// objects with required text and type, optional explanation.
pub fn hook_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "text": { "type": "STRING" },
                "type": { "type": "STRING" },
                "explanation": { "type": "STRING" }
            },
            "required": ["text", "type"]
        }
    })
}
