//! Translates source URIs (`hf://`, `civitai://`, bare `http(s)://`) into a
//! concrete HTTP URL plus the request headers needed to fetch it.
//!
//! The core download pipeline never special-cases a scheme: it calls
//! [`resolve`] once up front and only ever sees an `(url, headers)` pair
//! afterwards.

mod civitai;
mod error;
mod huggingface;

pub use error::{Result, ResolveError};

use url::Url;

/// What a [`Resolver`] hands back to the core: the concrete URL to fetch
/// and any headers (typically bearer auth) to attach to every request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedSource {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

pub trait Resolver {
    /// `uri` is the whole source URI, including scheme.
    fn resolve(&self, uri: &str) -> Result<ResolvedSource>;
}

/// Reads the token named by `token_env` from the environment, if set.
fn bearer_header(token_env: &str) -> Vec<(String, String)> {
    match std::env::var(token_env) {
        Ok(token) if !token.is_empty() => vec![("Authorization".to_string(), format!("Bearer {token}"))],
        _ => Vec::new(),
    }
}

/// Dispatches on `uri`'s scheme to the matching resolver. `hf_token_env` and
/// `civitai_token_env` name the environment variables holding each source's
/// bearer token (`token_env` in configuration; default `HF_TOKEN` /
/// `CIVITAI_TOKEN`).
pub fn resolve(uri: &str, hf_token_env: &str, civitai_token_env: &str) -> Result<ResolvedSource> {
    let scheme = uri
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| ResolveError::MalformedUri(uri.to_string()))?;

    match scheme {
        "hf" => huggingface::HuggingFaceResolver::new(hf_token_env).resolve(uri),
        "civitai" => civitai::CivitaiResolver::new(civitai_token_env).resolve(uri),
        "http" | "https" => Ok(ResolvedSource {
            url: uri.to_string(),
            headers: Vec::new(),
        }),
        other => Err(ResolveError::UnsupportedScheme(other.to_string())),
    }
}

pub(crate) fn parse(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|_| ResolveError::MalformedUri(uri.to_string()))
}

pub use civitai::CivitaiResolver;
pub use huggingface::HuggingFaceResolver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_for_https() {
        let resolved = resolve("https://example.com/file.bin", "HF_TOKEN", "CIVITAI_TOKEN").unwrap();
        assert_eq!(resolved.url, "https://example.com/file.bin");
        assert!(resolved.headers.is_empty());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = resolve("ftp://example.com/file.bin", "HF_TOKEN", "CIVITAI_TOKEN").unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn rejects_malformed_uri() {
        let err = resolve("not-a-uri", "HF_TOKEN", "CIVITAI_TOKEN").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedUri(_)));
    }
}
