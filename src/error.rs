use thiserror::Error;

/// Errors raised by the burrow tracker.
///
/// Corrupt frames and degenerate geometry are expected while processing noisy
/// video and are reported through return values, never through this type.
#[derive(Debug, Error)]
pub enum BurrowError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame is {actual:?} but the pipeline was set up for {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("ground profile needs at least two finite points, got {0}")]
    DegenerateGround(usize),

    #[error("no ground profile available for frame {0}")]
    MissingGround(u64),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, BurrowError>;
