#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("malformed source URI: {0}")]
    MalformedUri(String),

    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("hf:// URI is missing a repo path: {0}")]
    MissingHfPath(String),

    #[error("civitai:// URI is missing a model version: {0}")]
    MissingCivitaiVersion(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
