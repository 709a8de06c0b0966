use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameLensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Saliency analysis failed: {0}")]
    Saliency(String),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl GameLensError {
    /// True for failures of the execution channel itself (spawn, channel,
    /// timeout, worker panic). Input errors are deterministic and would fail
    /// the same way on any path.
    pub fn is_executor_failure(&self) -> bool {
        matches!(self, GameLensError::Executor(_))
    }
}

impl serde::Serialize for GameLensError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type GameLensResult<T> = Result<T, GameLensError>;
