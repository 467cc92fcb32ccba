//! Crossfade timeline planning
//!
//! Every image is decoded as a looping still for its display window plus the
//! following transition, because xfade overlaps the tail of one clip with the
//! head of the next. Offsets are positions on the merged output stream: each
//! chained xfade consumes one running offset, not a clip-local time.

use serde::Serialize;

use super::{Result, SlideshowError};

/// Immutable plan for a crossfade slideshow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionSchedule {
    /// Seconds each image is the only thing on screen
    pub display_duration: f64,
    /// Seconds each crossfade lasts
    pub transition_duration: f64,
    /// Seconds each still must be decoded for (display + transition)
    pub clip_duration: f64,
    /// Start of each crossfade on the merged timeline, one per image pair
    pub offsets: Vec<f64>,
}

impl TransitionSchedule {
    /// Number of images the schedule was planned for
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.offsets.len() + 1
    }

    /// Number of crossfades (`image_count - 1`)
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.offsets.len()
    }

    /// Length of the merged xfade stream
    ///
    /// The last xfade runs from its offset for one full clip of the final
    /// image, so this is `image_count * display + transition`.
    #[must_use]
    pub fn video_length(&self) -> f64 {
        self.offsets
            .last()
            .map_or(self.clip_duration, |last| last + self.clip_duration)
    }
}

/// Reject image counts that cannot form a single transition
pub fn ensure_enough_images(image_count: usize) -> Result<()> {
    if image_count < 2 {
        return Err(SlideshowError::InsufficientInput { count: image_count });
    }
    Ok(())
}

/// Plan the crossfade schedule for `image_count` stills over `total_duration` seconds
#[allow(clippy::cast_precision_loss)]
pub fn plan(
    image_count: usize,
    total_duration: f64,
    transition_duration: f64,
) -> Result<TransitionSchedule> {
    ensure_enough_images(image_count)?;

    let invalid = || SlideshowError::InvalidTiming {
        image_count,
        total_duration,
        transition_duration,
    };

    if !transition_duration.is_finite() || transition_duration <= 0.0 {
        return Err(invalid());
    }

    let display_duration = (total_duration - transition_duration) / (image_count - 1) as f64;

    // also catches NaN and infinite inputs
    if !display_duration.is_finite() || display_duration <= 0.0 {
        return Err(invalid());
    }

    let offsets = (1..image_count)
        .map(|i| i as f64 * display_duration)
        .collect();

    Ok(TransitionSchedule {
        display_duration,
        transition_duration,
        clip_duration: display_duration + transition_duration,
        offsets,
    })
}
