use thiserror::Error;

/// Failure in one of the external collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not read PDF: {0}")]
    Document(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The page image could not be produced, so recognition never ran.
    #[error("could not rasterize page: {0}")]
    Rasterize(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("service returned an error: {0}")]
    Api(String),

    #[error("external program failed: {0}")]
    Process(String),

    #[error("nothing to process: input is empty")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
