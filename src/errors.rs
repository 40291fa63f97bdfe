use thiserror::Error;

/// Errors that can occur while mapping a codebase.
///
/// Apart from `File` on a scan root, every variant is local to one file or one
/// language: the mapper logs it and moves on.
#[derive(Error, Debug)]
pub enum CodeMapError {
    #[error("file error: {message} (path: {path})")]
    File { message: String, path: String },

    #[error("grammar unavailable for {language}: {message}")]
    MissingGrammar { language: String, message: String },

    #[error("parse error: {message} (language: {language})")]
    Parse { message: String, language: String },

    #[error("generation oracle unavailable: {message}")]
    OracleUnavailable { message: String },

    #[error("generation oracle failed: {message}")]
    OracleFailure { message: String },

    #[error("generated {language} extractor rejected: {reason}")]
    InvalidGeneratedCode { language: String, reason: String },

    #[error("failed to compile {language} extractor: {message}")]
    CompileFailure { language: String, message: String },

    #[error("extraction error: {message} (language: {language})")]
    Extraction { message: String, language: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `CodeMapError`.
pub type Result<T> = std::result::Result<T, CodeMapError>;
