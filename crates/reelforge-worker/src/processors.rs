//! Per-type job processors.
//!
//! Processors are deliberately thin: report progress, poll cancellation
//! between steps, call the generation provider, persist artifacts through
//! object storage, and return a typed output. All state transitions happen
//! in the registry's dispatch path.

use std::sync::Arc;

use async_trait::async_trait;

use reelforge_models::{Job, JobInput, JobOutput, JobType, WorkerToken};

use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::registry::{JobProcessor, ProcessorRegistry};

/// Register the built-in processor for every job type.
pub fn register_default_processors(registry: &mut ProcessorRegistry) {
    registry.register(Arc::new(ScriptProcessor));
    registry.register(Arc::new(StoryboardProcessor));
    registry.register(Arc::new(ImageProcessor));
    registry.register(Arc::new(VideoProcessor));
    registry.register(Arc::new(SpeechProcessor));
    registry.register(Arc::new(ExportProcessor));
}

fn payload_mismatch(job: &Job) -> WorkerError {
    WorkerError::job_failed(format!(
        "payload does not match job type '{}'",
        job.job_type
    ))
}

pub struct ScriptProcessor;

#[async_trait]
impl JobProcessor for ScriptProcessor {
    fn job_type(&self) -> JobType {
        JobType::ScriptGeneration
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Script(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 10, "Writing script", token).await?;

        let scenes = ctx.provider.generate_script(input).await?;

        ctx.report(&job.id, 90, "Finalizing script", token).await?;
        Ok(JobOutput::Script { scenes })
    }
}

pub struct StoryboardProcessor;

#[async_trait]
impl JobProcessor for StoryboardProcessor {
    fn job_type(&self) -> JobType {
        JobType::StoryboardGeneration
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Storyboard(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 10, "Breaking script into frames", token)
            .await?;

        let frames = ctx.provider.generate_storyboard(input).await?;

        ctx.report(&job.id, 90, "Finalizing storyboard", token).await?;
        Ok(JobOutput::Storyboard { frames })
    }
}

pub struct ImageProcessor;

#[async_trait]
impl JobProcessor for ImageProcessor {
    fn job_type(&self) -> JobType {
        JobType::ImageGeneration
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Image(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 10, "Generating images", token).await?;

        let artifacts = ctx.provider.generate_image(input).await?;

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 70, "Storing images", token).await?;

        let mut urls = Vec::with_capacity(artifacts.len());
        for (i, artifact) in artifacts.into_iter().enumerate() {
            let key = format!("jobs/{}/image-{i}.png", job.id);
            urls.push(ctx.storage.put_and_get_url(&key, artifact).await?);
        }

        Ok(JobOutput::Image { urls })
    }
}

pub struct VideoProcessor;

#[async_trait]
impl JobProcessor for VideoProcessor {
    fn job_type(&self) -> JobType {
        JobType::VideoGeneration
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Video(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 10, "Rendering video segment", token).await?;

        let (artifact, duration_secs) = ctx.provider.generate_video(input).await?;

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 80, "Storing video", token).await?;

        let key = format!("jobs/{}/segment.mp4", job.id);
        let url = ctx.storage.put_and_get_url(&key, artifact).await?;

        Ok(JobOutput::Video { url, duration_secs })
    }
}

pub struct SpeechProcessor;

#[async_trait]
impl JobProcessor for SpeechProcessor {
    fn job_type(&self) -> JobType {
        JobType::SpeechSynthesis
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Speech(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 10, "Synthesizing narration", token).await?;

        let (artifact, duration_secs) = ctx.provider.synthesize_speech(input).await?;

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 80, "Storing narration", token).await?;

        let key = format!("jobs/{}/narration.mp3", job.id);
        let url = ctx.storage.put_and_get_url(&key, artifact).await?;

        Ok(JobOutput::Speech { url, duration_secs })
    }
}

pub struct ExportProcessor;

#[async_trait]
impl JobProcessor for ExportProcessor {
    fn job_type(&self) -> JobType {
        JobType::VideoExport
    }

    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput> {
        let JobInput::Export(input) = &job.input else {
            return Err(payload_mismatch(job));
        };

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 5, "Rendering timeline", token).await?;

        let (artifact, metadata) = ctx.provider.export_video(input).await?;
        let size_bytes = artifact.bytes.len() as u64;

        ctx.check_cancelled(&job.id).await?;
        ctx.report(&job.id, 85, "Uploading export", token).await?;

        let key = format!("exports/{}/{}.mp4", input.project_id, job.id);
        let url = ctx.storage.put_and_get_url(&key, artifact).await?;

        Ok(JobOutput::Export {
            url,
            size_bytes,
            metadata: Some(metadata),
        })
    }
}
