//! Maps the error taxonomy onto process exit codes: `0` success, `2` bad
//! input/config, `3` auth, `4` network unrecoverable, `5` checksum
//! mismatch, `6` filesystem, `1` other.

use modfetch_fetch::FetchError;

pub const OK: i32 = 0;
pub const BAD_INPUT: i32 = 2;
pub const AUTH: i32 = 3;
pub const NETWORK: i32 = 4;
pub const CHECKSUM: i32 = 5;
pub const FILESYSTEM: i32 = 6;
pub const OTHER: i32 = 1;

/// A CLI-level error carrying the exit code it should terminate with,
/// alongside a human-readable message and, for auth errors, a one-line
/// remediation hint.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(BAD_INPUT, message)
    }
}

impl From<&FetchError> for CliError {
    fn from(err: &FetchError) -> Self {
        let hint = match err {
            FetchError::AuthRequired { .. } => {
                "\nhint: set the token environment variable named by your source's token_env (e.g. HF_TOKEN, CIVITAI_TOKEN)".to_string()
            }
            _ => String::new(),
        };
        Self::new(err.exit_code(), format!("{err}{hint}"))
    }
}

impl From<modfetch_store::StoreError> for CliError {
    fn from(err: modfetch_store::StoreError) -> Self {
        Self::new(OTHER, err.to_string())
    }
}

impl From<modfetch_fs::Error> for CliError {
    fn from(err: modfetch_fs::Error) -> Self {
        Self::new(FILESYSTEM, err.to_string())
    }
}

impl From<modfetch_resolve::ResolveError> for CliError {
    fn from(err: modfetch_resolve::ResolveError) -> Self {
        Self::new(BAD_INPUT, err.to_string())
    }
}

impl From<crate::config::ConfigError> for CliError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::new(BAD_INPUT, err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::new(FILESYSTEM, err.to_string())
    }
}
