use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid field key: {0}")]
    InvalidFieldKey(String),

    #[error("unknown field kind: {0}")]
    UnknownFieldKind(String),

    #[error("unknown question part: {0}")]
    UnknownQuestionPart(String),

    #[error("invalid asset id: {0}")]
    InvalidAssetId(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
