//! External service seams.
//!
//! Generation and artifact storage are behind traits so processors stay
//! testable without network access. Production wiring supplies real
//! backends; the in-memory implementations here back local development
//! and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use reelforge_models::{
    ExportInput, ImageInput, ScriptInput, SpeechInput, StoryboardFrame, StoryboardInput, VideoInput,
};

use crate::error::WorkerResult;

/// A generated media artifact, ready for upload.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, content_type: &'static str) -> Self {
        Self { bytes, content_type }
    }
}

/// External media generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_script(&self, input: &ScriptInput) -> WorkerResult<Vec<String>>;

    async fn generate_storyboard(&self, input: &StoryboardInput)
        -> WorkerResult<Vec<StoryboardFrame>>;

    /// One artifact per requested image.
    async fn generate_image(&self, input: &ImageInput) -> WorkerResult<Vec<Artifact>>;

    /// Returns the rendered segment and its actual duration in seconds.
    async fn generate_video(&self, input: &VideoInput) -> WorkerResult<(Artifact, u32)>;

    /// Returns the narration audio and its duration in seconds.
    async fn synthesize_speech(&self, input: &SpeechInput) -> WorkerResult<(Artifact, u32)>;

    /// Returns the rendered export plus renderer diagnostics.
    async fn export_video(
        &self,
        input: &ExportInput,
    ) -> WorkerResult<(Artifact, HashMap<String, String>)>;
}

/// Artifact storage backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an artifact under a key and return a retrievable URL.
    async fn put_and_get_url(&self, key: &str, artifact: Artifact) -> WorkerResult<String>;
}

/// Deterministic provider for local development and tests.
#[derive(Debug, Default)]
pub struct StaticProvider;

#[async_trait]
impl GenerationProvider for StaticProvider {
    async fn generate_script(&self, input: &ScriptInput) -> WorkerResult<Vec<String>> {
        Ok((1..=input.scene_count)
            .map(|n| format!("Scene {n}: {}", input.topic))
            .collect())
    }

    async fn generate_storyboard(
        &self,
        input: &StoryboardInput,
    ) -> WorkerResult<Vec<StoryboardFrame>> {
        Ok(input
            .script
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, line)| StoryboardFrame {
                scene: i as u32 + 1,
                description: line.trim().to_string(),
                image_prompt: format!(
                    "{}{}",
                    line.trim(),
                    input
                        .style
                        .as_deref()
                        .map(|s| format!(", {s} style"))
                        .unwrap_or_default()
                ),
            })
            .collect())
    }

    async fn generate_image(&self, input: &ImageInput) -> WorkerResult<Vec<Artifact>> {
        Ok((0..input.count)
            .map(|i| {
                Artifact::new(
                    format!("png:{}x{}:{}:{i}", input.width, input.height, input.prompt)
                        .into_bytes(),
                    "image/png",
                )
            })
            .collect())
    }

    async fn generate_video(&self, input: &VideoInput) -> WorkerResult<(Artifact, u32)> {
        let artifact = Artifact::new(format!("mp4:{}", input.prompt).into_bytes(), "video/mp4");
        Ok((artifact, input.duration_secs))
    }

    async fn synthesize_speech(&self, input: &SpeechInput) -> WorkerResult<(Artifact, u32)> {
        // Rough narration pacing: ~15 characters per second.
        let duration = (input.text.len() as u32 / 15).max(1);
        let artifact = Artifact::new(
            format!("mp3:{}:{}", input.voice, input.text).into_bytes(),
            "audio/mpeg",
        );
        Ok((artifact, duration))
    }

    async fn export_video(
        &self,
        input: &ExportInput,
    ) -> WorkerResult<(Artifact, HashMap<String, String>)> {
        let artifact = Artifact::new(
            format!("mp4:export:{}", input.project_id).into_bytes(),
            "video/mp4",
        );
        let mut metadata = HashMap::new();
        metadata.insert("resolution".to_string(), resolution_label(input.resolution));
        Ok((artifact, metadata))
    }
}

fn resolution_label(res: reelforge_models::ExportResolution) -> String {
    use reelforge_models::ExportResolution::*;
    match res {
        Hd720 => "720p".to_string(),
        Hd1080 => "1080p".to_string(),
        Uhd4k => "4k".to_string(),
    }
}

/// In-memory storage keyed by object name.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Artifact>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_and_get_url(&self, key: &str, artifact: Artifact) -> WorkerResult<String> {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), artifact);
        }
        Ok(format!("memory://{key}"))
    }
}
