use thiserror::Error;

/// Failures raised while walking a fetched page.
///
/// Everything here is fatal for the extractor that produced it. Pages that
/// could not be fetched at all are not errors at the fetcher boundary; they
/// only become `Unavailable` when the caller runs under `FailurePolicy::Abort`.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("tag <{tag}> not found (attrs: {attrs})")]
    TagNotFound { tag: String, attrs: String },

    #[error("expected structure not found: {0}")]
    StructureNotFound(String),

    #[error("<{tag}> has no `{attr}` attribute")]
    MissingAttribute { tag: String, attr: String },

    #[error("status abbreviation is empty on {0}")]
    EmptyStatus(String),

    #[error("page unavailable: {0}")]
    Unavailable(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
