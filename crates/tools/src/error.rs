use std::path::PathBuf;

/// Failures while resolving or reading manifest sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("missing filename value")]
    EmptyFilename,

    #[error("multiple redirection to stdin detected")]
    DuplicateStdin,

    #[error("error accessing path {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pattern {pattern:?} is not valid: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("path not exist: {0}")]
    NoMatch(String),

    #[error("error walking directory {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("error reading from stdin: {0}")]
    Stdin(std::io::Error),

    #[error("invalid URL {url}: {source}")]
    BadUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("cannot GET file content from: {url} (status {status})")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },
}
