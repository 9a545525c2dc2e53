/// Core error type for the engine.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently: collaborator failures are logged and
/// never fatal, configuration failures abort startup, validation failures are
/// reported to the operator without touching any collaborator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("social client error: {0}")]
    Social(String),

    #[error("brain error: {0}")]
    Brain(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("lifecycle error: {0}")]
    State(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
