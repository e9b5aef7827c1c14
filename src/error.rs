use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Realtime channel error: {0}")]
    Channel(String),

    #[error("Cache error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("No conversation is open")]
    NoActivePartner,
}

pub type Result<T> = std::result::Result<T, ChatError>;
