// THEORY:
// Tunable parameters of the burrow tracker and the colour statistics measured
// before the frame loop starts. Both are plain data: the pipeline reads them,
// never mutates them. Parameters come from a YAML file where every field is
// optional and falls back to the defaults below.

use crate::error::{BurrowError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the `BurrowPipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Weight of the newest frame in the running-average background.
    pub adaptation_rate: f64,
    /// Minimum number of pixels a connected region needs to count as a burrow chunk.
    pub area_min: usize,
    /// Depth below the ground line (in pixels) that separates burrows from surface noise.
    pub ground_point_distance: f64,
    /// Typical burrow diameter in pixels. Controls how far bridges reach sideways.
    pub burrow_width: f64,
    /// Maximum gap between exit points that still belong to the same burrow exit.
    /// Defaults to `burrow_width`.
    pub cluster_distance: Option<f64>,
    /// Fraction of the ground area that may change in one frame before the frame
    /// is treated as corrupt (a lighting flicker, usually).
    pub mask_safety_fraction: f64,
    /// Position between sky (0) and sand (1) colour above which a region is too
    /// bright to be a burrow.
    pub brightness_rejection_fraction: f64,
    /// Position between sky (0) and sand (1) colour used as the starting threshold
    /// when seeding the burrow mask from the first frame.
    pub initial_threshold_fraction: f64,
    /// Chunks closer to the ground than this are considered touching it.
    pub connection_tolerance: f64,
    /// Number of video frames between two analysed frames.
    pub frame_period: u64,
    /// Emit a progress line every this many analysed frames.
    pub progress_log_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            adaptation_rate: 0.01,
            area_min: 1000,
            ground_point_distance: 10.0,
            burrow_width: 20.0,
            cluster_distance: None,
            mask_safety_fraction: 0.1,
            brightness_rejection_fraction: 0.8,
            initial_threshold_fraction: 0.33,
            connection_tolerance: 1.0,
            frame_period: 1,
            progress_log_interval: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn cluster_distance(&self) -> f64 {
        self.cluster_distance.unwrap_or(self.burrow_width)
    }

    /// Rejects parameter combinations the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn fraction(name: &str, value: f64) -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(BurrowError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )))
            }
        }
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(BurrowError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        }

        positive("adaptation_rate", self.adaptation_rate)?;
        fraction("adaptation_rate", self.adaptation_rate)?;
        positive("ground_point_distance", self.ground_point_distance)?;
        positive("burrow_width", self.burrow_width)?;
        positive("cluster_distance", self.cluster_distance())?;
        fraction("mask_safety_fraction", self.mask_safety_fraction)?;
        fraction("brightness_rejection_fraction", self.brightness_rejection_fraction)?;
        fraction("initial_threshold_fraction", self.initial_threshold_fraction)?;
        if !(self.connection_tolerance.is_finite() && self.connection_tolerance >= 0.0) {
            return Err(BurrowError::InvalidConfig(format!(
                "connection_tolerance must be non-negative, got {}",
                self.connection_tolerance
            )));
        }
        if self.area_min == 0 {
            return Err(BurrowError::InvalidConfig("area_min must be at least 1".into()));
        }
        if self.frame_period == 0 {
            return Err(BurrowError::InvalidConfig("frame_period must be at least 1".into()));
        }
        Ok(())
    }
}

/// Global colour statistics of the enclosure, measured once before the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    pub sand_mean: f64,
    pub sand_std: f64,
    pub sky_mean: f64,
    pub sky_std: f64,
}

impl ColorStats {
    /// Intensity drop (relative to the background) that counts as excavation.
    pub fn change_threshold(&self) -> f64 {
        self.sand_std
    }

    /// Linear blend between sand (`fraction == 1`) and sky (`fraction == 0`).
    pub fn blend(&self, fraction: f64) -> f64 {
        fraction * self.sand_mean + (1.0 - fraction) * self.sky_mean
    }

    /// Means must be grey levels and deviations non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, mean) in [("sand_mean", self.sand_mean), ("sky_mean", self.sky_mean)] {
            if !(0.0..=255.0).contains(&mean) {
                return Err(BurrowError::InvalidConfig(format!(
                    "{name} must be a grey level in [0, 255], got {mean}"
                )));
            }
        }
        for (name, std) in [("sand_std", self.sand_std), ("sky_std", self.sky_std)] {
            if !(std.is_finite() && std >= 0.0) {
                return Err(BurrowError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {std}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = PipelineConfig::from_yaml_str("area_min: 250\nburrow_width: 12.5\n").unwrap();
        assert_eq!(config.area_min, 250);
        assert_eq!(config.burrow_width, 12.5);
        assert_eq!(config.cluster_distance(), 12.5);
        assert_eq!(config.mask_safety_fraction, 0.1);
    }

    #[test]
    fn explicit_cluster_distance_wins() {
        let config = PipelineConfig {
            cluster_distance: Some(4.0),
            ..PipelineConfig::default()
        };
        assert_eq!(config.cluster_distance(), 4.0);
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        let result = PipelineConfig::from_yaml_str("mask_safety_fraction: 1.5\n");
        assert!(matches!(result, Err(BurrowError::InvalidConfig(_))));

        let config = PipelineConfig {
            adaptation_rate: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn color_blend_interpolates_between_sand_and_sky() {
        let colors = ColorStats {
            sand_mean: 100.0,
            sand_std: 4.0,
            sky_mean: 200.0,
            sky_std: 6.0,
        };
        assert_eq!(colors.blend(1.0), 100.0);
        assert_eq!(colors.blend(0.0), 200.0);
        assert!((colors.blend(0.8) - 120.0).abs() < 1e-9);
        assert_eq!(colors.change_threshold(), 4.0);
    }

    #[test]
    fn color_stats_outside_the_grey_range_are_rejected() {
        let valid = ColorStats {
            sand_mean: 100.0,
            sand_std: 4.0,
            sky_mean: 200.0,
            sky_std: 6.0,
        };
        assert!(valid.validate().is_ok());

        let bright_sky = ColorStats { sky_mean: 1e12, ..valid };
        assert!(matches!(bright_sky.validate(), Err(BurrowError::InvalidConfig(_))));
        let unknown_sand = ColorStats { sand_mean: f64::NAN, ..valid };
        assert!(unknown_sand.validate().is_err());
        let negative_spread = ColorStats { sand_std: -1.0, ..valid };
        assert!(negative_spread.validate().is_err());
    }
}
