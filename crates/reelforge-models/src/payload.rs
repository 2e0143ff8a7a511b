//! Typed job payloads.
//!
//! Inputs and results are tagged unions with one variant per job type,
//! decoded once at the submission boundary. Processors pattern-match on
//! these types and never re-parse raw JSON.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::job::JobType;

/// Validation failure for a submitted payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl PayloadError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Input for script generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptInput {
    /// Topic brief for the script
    pub topic: String,
    /// Optional tone of voice (e.g. "casual", "dramatic")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Number of scenes to write (1-20)
    #[serde(default = "default_scene_count")]
    pub scene_count: u32,
}

fn default_scene_count() -> u32 {
    5
}

/// Input for storyboard generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryboardInput {
    /// Script text to visualize
    pub script: String,
    /// Visual style hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Input for still image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageInput {
    /// Generation prompt
    pub prompt: String,
    /// Visual style hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Number of images to generate (1-8)
    #[serde(default = "default_image_count")]
    pub count: u32,
    /// Output width in pixels
    #[serde(default = "default_image_dim")]
    pub width: u32,
    /// Output height in pixels
    #[serde(default = "default_image_dim")]
    pub height: u32,
}

fn default_image_count() -> u32 {
    1
}

fn default_image_dim() -> u32 {
    1024
}

/// Input for video segment generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoInput {
    /// Generation prompt
    pub prompt: String,
    /// Reference image URL, if animating a storyboard frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
    /// Requested duration in seconds (1-60)
    pub duration_secs: u32,
}

/// Input for speech synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeechInput {
    /// Text to narrate
    pub text: String,
    /// Voice identifier
    pub voice: String,
    /// Playback speed multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

/// Export output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportResolution {
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4k")]
    Uhd4k,
}

/// Input for final video export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportInput {
    /// Project whose timeline is rendered
    pub project_id: String,
    /// Output resolution
    #[serde(default)]
    pub resolution: ExportResolution,
    /// Burn captions into the output
    #[serde(default)]
    pub include_captions: bool,
}

/// Processor-specific input payload, tagged by job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInput {
    Script(ScriptInput),
    Storyboard(StoryboardInput),
    Image(ImageInput),
    Video(VideoInput),
    Speech(SpeechInput),
    Export(ExportInput),
}

impl JobInput {
    /// The job type this payload belongs to.
    pub fn job_type(&self) -> JobType {
        match self {
            JobInput::Script(_) => JobType::ScriptGeneration,
            JobInput::Storyboard(_) => JobType::StoryboardGeneration,
            JobInput::Image(_) => JobType::ImageGeneration,
            JobInput::Video(_) => JobType::VideoGeneration,
            JobInput::Speech(_) => JobType::SpeechSynthesis,
            JobInput::Export(_) => JobType::VideoExport,
        }
    }

    /// Validate field constraints at submission time.
    ///
    /// Rejected payloads are never enqueued.
    pub fn validate(&self) -> Result<(), PayloadError> {
        match self {
            JobInput::Script(s) => {
                if s.topic.trim().is_empty() {
                    return Err(PayloadError::MissingField("topic"));
                }
                if s.scene_count == 0 || s.scene_count > 20 {
                    return Err(PayloadError::invalid("scene_count", "must be 1-20"));
                }
            }
            JobInput::Storyboard(s) => {
                if s.script.trim().is_empty() {
                    return Err(PayloadError::MissingField("script"));
                }
            }
            JobInput::Image(i) => {
                if i.prompt.trim().is_empty() {
                    return Err(PayloadError::MissingField("prompt"));
                }
                if i.count == 0 || i.count > 8 {
                    return Err(PayloadError::invalid("count", "must be 1-8"));
                }
                if i.width == 0 || i.height == 0 {
                    return Err(PayloadError::invalid("width/height", "must be non-zero"));
                }
            }
            JobInput::Video(v) => {
                if v.prompt.trim().is_empty() {
                    return Err(PayloadError::MissingField("prompt"));
                }
                if v.duration_secs == 0 || v.duration_secs > 60 {
                    return Err(PayloadError::invalid("duration_secs", "must be 1-60"));
                }
            }
            JobInput::Speech(s) => {
                if s.text.trim().is_empty() {
                    return Err(PayloadError::MissingField("text"));
                }
                if s.voice.trim().is_empty() {
                    return Err(PayloadError::MissingField("voice"));
                }
            }
            JobInput::Export(e) => {
                if e.project_id.trim().is_empty() {
                    return Err(PayloadError::MissingField("project_id"));
                }
            }
        }
        Ok(())
    }
}

/// A single storyboard frame description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryboardFrame {
    /// Scene index this frame belongs to
    pub scene: u32,
    /// Visual description of the frame
    pub description: String,
    /// Image prompt derived from the description
    pub image_prompt: String,
}

/// Result payload, set only when a job completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutput {
    Script {
        /// Generated script text, one entry per scene
        scenes: Vec<String>,
    },
    Storyboard {
        frames: Vec<StoryboardFrame>,
    },
    Image {
        /// Stored artifact URLs, one per generated image
        urls: Vec<String>,
    },
    Video {
        url: String,
        duration_secs: u32,
    },
    Speech {
        url: String,
        duration_secs: u32,
    },
    Export {
        url: String,
        size_bytes: u64,
        /// Renderer diagnostics (encoder, pass timings)
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, String>>,
    },
}

impl JobOutput {
    /// The job type this result belongs to.
    pub fn job_type(&self) -> JobType {
        match self {
            JobOutput::Script { .. } => JobType::ScriptGeneration,
            JobOutput::Storyboard { .. } => JobType::StoryboardGeneration,
            JobOutput::Image { .. } => JobType::ImageGeneration,
            JobOutput::Video { .. } => JobType::VideoGeneration,
            JobOutput::Speech { .. } => JobType::SpeechSynthesis,
            JobOutput::Export { .. } => JobType::VideoExport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_tag_roundtrip() {
        let input = JobInput::Image(ImageInput {
            prompt: "sunset over a harbor".into(),
            style: None,
            count: 2,
            width: 1024,
            height: 1024,
        });
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("\"kind\":\"image\""));
        let decoded: JobInput = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, input);
        assert_eq!(decoded.job_type(), JobType::ImageGeneration);
    }

    #[test]
    fn test_defaults_applied_on_decode() {
        let decoded: JobInput =
            serde_json::from_str(r#"{"kind":"image","prompt":"a cat"}"#).unwrap();
        match decoded {
            JobInput::Image(i) => {
                assert_eq!(i.count, 1);
                assert_eq!(i.width, 1024);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_empty_prompt() {
        let input = JobInput::Image(ImageInput {
            prompt: "  ".into(),
            style: None,
            count: 1,
            width: 1024,
            height: 1024,
        });
        assert_eq!(input.validate(), Err(PayloadError::MissingField("prompt")));
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let input = JobInput::Video(VideoInput {
            prompt: "rolling waves".into(),
            reference_image_url: None,
            duration_secs: 600,
        });
        assert!(matches!(
            input.validate(),
            Err(PayloadError::InvalidValue { field: "duration_secs", .. })
        ));
    }

    #[test]
    fn test_resolution_serde_names() {
        assert_eq!(
            serde_json::to_string(&ExportResolution::Uhd4k).unwrap(),
            "\"4k\""
        );
        assert_eq!(
            serde_json::from_str::<ExportResolution>("\"1080p\"").unwrap(),
            ExportResolution::Hd1080
        );
    }
}
