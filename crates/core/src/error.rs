use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A scenario references a capability that is not registered.
    /// Fatal at plan-build time; the engine refuses to execute the plan.
    #[error("Unknown capability '{capability}' required by scenario '{scenario}'")]
    UnknownCapability { capability: String, scenario: String },

    /// A scenario lists the same capability more than once. Fatal at
    /// plan-build time; conditional status channels are keyed by name.
    #[error("Duplicate capability '{capability}' in scenario '{scenario}'")]
    DuplicateCapability { capability: String, scenario: String },

    /// A conditional dependency does not reference an earlier call of the
    /// same plan. Fatal at plan-build time.
    #[error("Invalid dependency '{depends_on}' for capability '{capability}' in scenario '{scenario}'")]
    InvalidDependency {
        capability: String,
        depends_on: String,
        scenario: String,
    },

    #[error("Capability error: {0}")]
    Capability(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
