//! Resolves `civitai://model/<id>?version=<version_id>` into Civitai's
//! model-version download endpoint.

use crate::{bearer_header, parse, ResolveError, ResolvedSource, Resolver, Result};

pub struct CivitaiResolver {
    token_env: String,
}

impl CivitaiResolver {
    pub fn new(token_env: impl Into<String>) -> Self {
        Self {
            token_env: token_env.into(),
        }
    }
}

impl Resolver for CivitaiResolver {
    fn resolve(&self, uri: &str) -> Result<ResolvedSource> {
        let parsed = parse(uri)?;

        let version = parsed
            .query_pairs()
            .find(|(k, _)| k == "version")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| ResolveError::MissingCivitaiVersion(uri.to_string()))?;

        let url = format!("https://civitai.com/api/download/models/{version}");

        Ok(ResolvedSource {
            url,
            headers: bearer_header(&self.token_env),
        })
    }
}
