use anyhow::{Context, Result, bail};
use burrow_vision::ColorStats;
use burrow_vision::core_modules::ground::{GroundProfile, GroundTimeline};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Ground profile valid from `frame` until the next keyframe.
#[derive(Debug, Deserialize)]
pub struct GroundKeyframe {
    pub frame: u64,
    pub points: Vec<[f64; 2]>,
}

/// Everything measured about the enclosure before burrow tracking starts.
#[derive(Debug, Deserialize)]
pub struct Scene {
    pub colors: ColorStats,
    pub ground: Vec<GroundKeyframe>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        let scene: Scene = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse scene file {}", path.display()))?;
        if scene.ground.is_empty() {
            bail!("scene file {} has no ground profile", path.display());
        }
        Ok(scene)
    }

    pub fn ground_timeline(&self) -> Result<GroundTimeline> {
        let keyframes = self
            .ground
            .iter()
            .map(|keyframe| {
                let profile = GroundProfile::new(keyframe.points.iter().map(|&[x, y]| (x, y)))
                    .with_context(|| format!("bad ground profile at frame {}", keyframe.frame))?;
                Ok((keyframe.frame, profile))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GroundTimeline::new(keyframes))
    }
}
