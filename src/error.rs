use std::path::PathBuf;

use crate::types::Joint;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("landmark for {joint} contains a non-finite value")]
    NonFiniteLandmark { joint: Joint },

    #[error("frame timestamp went backwards: {current} ms after {previous} ms")]
    TimestampRegression { previous: u64, current: u64 },

    #[error("required joint {0} missing from frame")]
    MissingJoint(Joint),

    #[error("expected {expected} landmarks per frame, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {1}")]
    ReadConfig(#[source] std::io::Error, PathBuf),

    #[error("failed to write config file {1}")]
    WriteConfig(#[source] std::io::Error, PathBuf),

    #[error("failed to parse config")]
    ParseConfig(#[source] toml::de::Error),

    #[error("failed to serialize config")]
    SerializeConfig(#[source] toml::ser::Error),

    #[error("advisory classifier failed: {0}")]
    Classifier(String),

    #[error("advisory worker unavailable: {0}")]
    AdvisoryUnavailable(String),

    #[error("failed to serialize to json")]
    Serialize(#[source] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
