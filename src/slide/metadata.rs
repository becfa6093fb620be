//! Pyramid metadata for one open slide.
//!
//! `SlideMetadata` is the immutable description of the image pyramid,
//! fetched once from the server's info endpoint when a slide is opened.
//! Everything else in the engine reads from it; nothing mutates it.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "dimensions": [10000, 8000],
//!   "level_dimensions": [[10000, 8000], [2500, 2000], [625, 500]],
//!   "level_downsamples": [1.0, 4.0, 16.0],
//!   "properties": {"openslide.vendor": "aperio"}
//! }
//! ```
//!
//! Arrays are index-aligned: level 0 is the highest resolution, higher
//! indices are progressively downsampled.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::MetadataError;

// =============================================================================
// SlideMetadata
// =============================================================================

/// Immutable pyramid description for one open slide.
#[derive(Debug, Clone, Deserialize)]
pub struct SlideMetadata {
    /// Base-level (level 0) pixel size as `(width, height)`
    pub dimensions: (u32, u32),

    /// Pixel size of every pyramid level, index 0 = highest resolution
    pub level_dimensions: Vec<(u32, u32)>,

    /// Downsample factor of every level, index-aligned with
    /// `level_dimensions`; `[0]` is 1.0 and the sequence is strictly
    /// increasing
    pub level_downsamples: Vec<f64>,

    /// Vendor metadata, informational only
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl SlideMetadata {
    /// Validate the pyramid invariants.
    ///
    /// A document that fails validation is treated the same as a transport
    /// failure: the slide cannot be opened.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let malformed = |reason: String| Err(MetadataError::Malformed { reason });

        if self.level_dimensions.is_empty() {
            return malformed("level_dimensions is empty".to_string());
        }
        if self.level_dimensions.len() != self.level_downsamples.len() {
            return malformed(format!(
                "{} level dimensions but {} downsamples",
                self.level_dimensions.len(),
                self.level_downsamples.len()
            ));
        }
        if self.dimensions.0 == 0 || self.dimensions.1 == 0 {
            return malformed(format!(
                "degenerate base dimensions {}x{}",
                self.dimensions.0, self.dimensions.1
            ));
        }
        if self.level_dimensions[0] != self.dimensions {
            return malformed(format!(
                "level 0 is {}x{} but dimensions say {}x{}",
                self.level_dimensions[0].0,
                self.level_dimensions[0].1,
                self.dimensions.0,
                self.dimensions.1
            ));
        }
        if self.level_downsamples[0] != 1.0 {
            return malformed(format!(
                "level 0 downsample is {}, expected 1",
                self.level_downsamples[0]
            ));
        }
        for pair in self.level_downsamples.windows(2) {
            if pair[1] <= pair[0] || !pair[1].is_finite() {
                return malformed(format!(
                    "downsamples not strictly increasing: {} then {}",
                    pair[0], pair[1]
                ));
            }
        }
        Ok(())
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.level_dimensions.len()
    }

    /// Pixel dimensions of a level, or `None` if out of range.
    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.level_dimensions.get(level).copied()
    }

    /// Downsample factor of a level, or `None` if out of range.
    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.level_downsamples.get(level).copied()
    }

    /// Select the level whose native resolution is closest to the screen
    /// resolution requested by `zoom`.
    ///
    /// A zoom of `z` asks for `1/z` image pixels per canvas pixel, so this
    /// minimizes `|downsample[i] - 1/zoom|`. Ties resolve to the first
    /// (highest-resolution) minimizer found scanning in increasing index
    /// order.
    pub fn best_level_for_zoom(&self, zoom: f64) -> usize {
        let wanted = 1.0 / zoom;
        let mut best = 0;
        let mut best_diff = f64::INFINITY;

        for (i, ds) in self.level_downsamples.iter().enumerate() {
            let diff = (ds - wanted).abs();
            if diff < best_diff {
                best_diff = diff;
                best = i;
            }
        }
        best
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn three_level_metadata() -> SlideMetadata {
        SlideMetadata {
            dimensions: (10000, 8000),
            level_dimensions: vec![(10000, 8000), (2500, 2000), (625, 500)],
            level_downsamples: vec![1.0, 4.0, 16.0],
            properties: HashMap::new(),
        }
    }

    #[test]
    fn test_valid_metadata() {
        assert!(three_level_metadata().validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_info_json() {
        let json = r#"{
            "dimensions": [10000, 8000],
            "level_dimensions": [[10000, 8000], [2500, 2000], [625, 500]],
            "level_downsamples": [1.0, 4.0, 16.0],
            "properties": {"openslide.vendor": "aperio"}
        }"#;
        let meta: SlideMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.validate().is_ok());
        assert_eq!(meta.level_count(), 3);
        assert_eq!(meta.properties["openslide.vendor"], "aperio");
    }

    #[test]
    fn test_missing_properties_defaults_empty() {
        let json = r#"{
            "dimensions": [100, 100],
            "level_dimensions": [[100, 100]],
            "level_downsamples": [1.0]
        }"#;
        let meta: SlideMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.validate().is_ok());
        assert!(meta.properties.is_empty());
    }

    #[test]
    fn test_empty_levels_rejected() {
        let meta = SlideMetadata {
            dimensions: (100, 100),
            level_dimensions: vec![],
            level_downsamples: vec![],
            properties: HashMap::new(),
        };
        assert!(matches!(
            meta.validate(),
            Err(MetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn test_misaligned_arrays_rejected() {
        let mut meta = three_level_metadata();
        meta.level_downsamples.pop();
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_non_increasing_downsamples_rejected() {
        let mut meta = three_level_metadata();
        meta.level_downsamples = vec![1.0, 4.0, 4.0];
        assert!(meta.validate().is_err());

        meta.level_downsamples = vec![1.0, 16.0, 4.0];
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_level_zero_downsample_must_be_one() {
        let mut meta = three_level_metadata();
        meta.level_downsamples[0] = 2.0;
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_accessors_out_of_range() {
        let meta = three_level_metadata();
        assert_eq!(meta.level_dimensions(2), Some((625, 500)));
        assert_eq!(meta.level_dimensions(3), None);
        assert_eq!(meta.level_downsample(1), Some(4.0));
        assert_eq!(meta.level_downsample(9), None);
    }

    #[test]
    fn test_best_level_scenario() {
        // zoom 0.2 asks for 1/0.2 = 5 image px per canvas px; the closest
        // downsample among [1, 4, 16] is 4, i.e. level 1.
        let meta = three_level_metadata();
        assert_eq!(meta.best_level_for_zoom(0.2), 1);
    }

    #[test]
    fn test_best_level_extremes() {
        let meta = three_level_metadata();
        // Deep zoom in wants level 0.
        assert_eq!(meta.best_level_for_zoom(1.0), 0);
        assert_eq!(meta.best_level_for_zoom(16.0), 0);
        // Far zoom out wants the coarsest level.
        assert_eq!(meta.best_level_for_zoom(0.01), 2);
    }

    #[test]
    fn test_best_level_tie_breaks_to_higher_resolution() {
        // 1/zoom = 2.5 is equidistant from 1.0 and 4.0; the first (lower
        // index, higher resolution) minimizer wins.
        let meta = three_level_metadata();
        assert_eq!(meta.best_level_for_zoom(1.0 / 2.5), 0);
    }

    #[test]
    fn test_best_level_matches_brute_force() {
        let meta = three_level_metadata();
        let mut zoom = 0.05;
        while zoom <= 16.0 {
            let brute = meta
                .level_downsamples
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = (*a - 1.0 / zoom).abs();
                    let db = (*b - 1.0 / zoom).abs();
                    da.partial_cmp(&db).unwrap()
                })
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(meta.best_level_for_zoom(zoom), brute, "zoom {}", zoom);
            zoom += 0.013;
        }
    }
}
