// THEORY:
// This file is the main entry point for the `burrow_vision` library crate.
// It exposes the `BurrowPipeline` and its associated data structures
// (`PipelineConfig`, `ColorStats`, `FrameReport`, `BurrowTrack`, ...) as the
// high-level interface of the burrow tracker. The image-processing and geometry
// stages live in `core_modules` and can be used on their own, but most callers
// only ever construct a pipeline and feed it frames.
//
// Per frame, data flows strictly in one direction:
//   frame -> background model -> burrow mask -> chunks -> connected burrows -> tracks
// The background model, the burrow mask and the track list persist across frames;
// everything else is recomputed every frame.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::{ColorStats, PipelineConfig};
pub use error::{BurrowError, Result};
pub use pipeline::{AnalysisStatus, AnalysisSummary, BurrowPipeline, FrameReport};
