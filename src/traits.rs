use crate::model::SurveyLog;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    InvalidXml(String),
    #[error("Missing required element: {0}")]
    Schema(String),
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Attribute '{field}' is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[async_trait]
pub trait LogParser: Send + Sync {
    /// Returns the format ID this parser handles (e.g., "dados-trecho").
    fn format_id(&self) -> &str;

    /// Parses raw file content into a header and its ordered entries.
    async fn parse(&self, content: &[u8]) -> Result<SurveyLog, ParseError>;
}
