use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusicSourceError {
    #[error("music source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("music source is not authenticated")]
    NotAuthenticated,

    #[error("unknown music source '{0}'")]
    UnknownKind(String),

    #[error("invalid release date '{0}'")]
    BadReleaseDate(String),

    #[error("music service request failed: {0}")]
    Http(#[from] reqwest::Error),
}
