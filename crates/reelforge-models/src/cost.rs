//! Credit cost estimation.
//!
//! Pure functions of the submitted payload; the ledger is never touched
//! here. Costs are charged upfront at submission.

use crate::payload::{ExportResolution, JobInput};

/// Base cost for a generated script.
pub const SCRIPT_COST: u32 = 2;
/// Base cost for a storyboard.
pub const STORYBOARD_COST: u32 = 4;
/// Cost per generated image.
pub const IMAGE_COST_PER_IMAGE: u32 = 6;
/// Base cost for a video segment.
pub const VIDEO_BASE_COST: u32 = 10;
/// Additional cost per started 10 seconds of video.
pub const VIDEO_COST_PER_10S: u32 = 2;
/// Base cost for speech synthesis.
pub const SPEECH_BASE_COST: u32 = 3;
/// Additional cost per extra 1000 characters beyond the first.
pub const SPEECH_COST_PER_EXTRA_1K_CHARS: u32 = 1;
/// Base cost for an export render.
pub const EXPORT_COST: u32 = 10;
/// Export cost at 4K.
pub const EXPORT_COST_4K: u32 = 12;

/// Estimate the credit cost of a job before submission.
pub fn estimate_cost(input: &JobInput) -> u32 {
    match input {
        JobInput::Script(_) => SCRIPT_COST,
        JobInput::Storyboard(_) => STORYBOARD_COST,
        JobInput::Image(i) => IMAGE_COST_PER_IMAGE * i.count.max(1),
        JobInput::Video(v) => {
            let blocks = v.duration_secs.div_ceil(10).max(1);
            VIDEO_BASE_COST + VIDEO_COST_PER_10S * blocks
        }
        JobInput::Speech(s) => {
            let extra_chars = s.text.len().saturating_sub(1000) as u32;
            SPEECH_BASE_COST + SPEECH_COST_PER_EXTRA_1K_CHARS * extra_chars.div_ceil(1000)
        }
        JobInput::Export(e) => match e.resolution {
            ExportResolution::Uhd4k => EXPORT_COST_4K,
            _ => EXPORT_COST,
        },
    }
}
