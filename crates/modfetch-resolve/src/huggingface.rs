//! Resolves `hf://owner/repo/path?rev=<ref>` into the Hugging Face Hub's
//! `resolve` download endpoint.

use crate::{bearer_header, parse, ResolveError, ResolvedSource, Resolver, Result};

pub struct HuggingFaceResolver {
    token_env: String,
}

impl HuggingFaceResolver {
    pub fn new(token_env: impl Into<String>) -> Self {
        Self {
            token_env: token_env.into(),
        }
    }
}

impl Resolver for HuggingFaceResolver {
    fn resolve(&self, uri: &str) -> Result<ResolvedSource> {
        let parsed = parse(uri)?;
        let owner = parsed
            .host_str()
            .ok_or_else(|| ResolveError::MissingHfPath(uri.to_string()))?;

        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| ResolveError::MissingHfPath(uri.to_string()))?
            .filter(|s| !s.is_empty());

        let repo = segments
            .next()
            .ok_or_else(|| ResolveError::MissingHfPath(uri.to_string()))?;
        let file_path: Vec<&str> = segments.collect();
        if file_path.is_empty() {
            return Err(ResolveError::MissingHfPath(uri.to_string()));
        }

        let rev = parsed
            .query_pairs()
            .find(|(k, _)| k == "rev")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| "main".to_string());

        let url = format!(
            "https://huggingface.co/{owner}/{repo}/resolve/{rev}/{}",
            file_path.join("/")
        );

        Ok(ResolvedSource {
            url,
            headers: bearer_header(&self.token_env),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_resolve_url_with_default_rev() {
        let resolver = HuggingFaceResolver::new("HF_TOKEN_TEST_UNSET");
        let resolved = resolver
            .resolve("hf://TheBloke/Llama-2-7B-GGUF/llama-2-7b.Q4_K_M.gguf")
            .unwrap();
        assert_eq!(
            resolved.url,
            "https://huggingface.co/TheBloke/Llama-2-7B-GGUF/resolve/main/llama-2-7b.Q4_K_M.gguf"
        );
    }

    #[test]
    fn honors_rev_query_param() {
        let resolver = HuggingFaceResolver::new("HF_TOKEN_TEST_UNSET");
        let resolved = resolver
            .resolve("hf://org/repo/sub/dir/file.bin?rev=refs%2Fpr%2F1")
            .unwrap();
        assert_eq!(
            resolved.url,
            "https://huggingface.co/org/repo/resolve/refs/pr/1/sub/dir/file.bin"
        );
    }

    #[test]
    fn rejects_uri_with_no_file_path() {
        let resolver = HuggingFaceResolver::new("HF_TOKEN_TEST_UNSET");
        assert!(resolver.resolve("hf://org/repo").is_err());
    }
}
