//! Asynchronous HTTP client abstraction.
//!
//! Mirrors a minimal transport interface so the rest of the pipeline (Probe,
//! Worker Pool, Single-Stream Fallback) never depends on `reqwest`
//! directly — tests drive it against an in-memory mock instead of a real
//! server.

use std::future::Future;

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Capability probe outcome: status, and the handful of headers the Probe
/// (C3) and Verifier/Fallback (C6/C7) care about.
#[derive(Clone, Debug, Default)]
pub struct HeadInfo {
    pub status: u16,
    pub content_length: Option<u64>,
    pub accept_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// A ranged or whole-file GET's response metadata plus its body stream.
pub struct GetResponse<E> {
    pub status: u16,
    pub content_length: Option<u64>,
    pub content_range_total: Option<u64>,
    pub retry_after: Option<std::time::Duration>,
    pub www_authenticate: bool,
    pub body: BoxStream<std::result::Result<Bytes, E>>,
}

pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// HEAD request; used by the Probe. Implementations should not follow
    /// an arbitrary number of redirects beyond configuration.
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = std::result::Result<HeadInfo, Self::Error>> + Send;

    /// GET with an optional byte range `(start, end_inclusive)`. `end=None`
    /// means "to EOF".
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        range: Option<(u64, Option<u64>)>,
    ) -> impl Future<Output = std::result::Result<GetResponse<Self::Error>, Self::Error>> + Send;
}

pub mod reqwest_client {
    use super::*;
    use futures_util::StreamExt;

    /// Transport-level knobs from `[network]` config, kept separate from
    /// [`HttpClient`]'s per-request `headers` argument
    /// because these apply to the whole client, not one request.
    #[derive(Clone, Debug)]
    pub struct ClientOptions {
        pub timeout: std::time::Duration,
        pub user_agent: String,
        pub max_redirects: usize,
        pub tls_verify: bool,
    }

    impl Default for ClientOptions {
        fn default() -> Self {
            Self {
                timeout: std::time::Duration::from_secs(30),
                user_agent: concat!("modfetch/", env!("CARGO_PKG_VERSION")).to_string(),
                max_redirects: 10,
                tls_verify: true,
            }
        }
    }

    #[derive(Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(timeout: std::time::Duration, user_agent: &str) -> reqwest::Result<Self> {
            Self::with_options(ClientOptions {
                timeout,
                user_agent: user_agent.to_string(),
                ..ClientOptions::default()
            })
        }

        pub fn with_options(options: ClientOptions) -> reqwest::Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(options.timeout)
                .user_agent(options.user_agent)
                .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
                .danger_accept_invalid_certs(!options.tls_verify)
                .build()?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn head(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<HeadInfo, Self::Error> {
            let mut request = self.client.head(url);
            for (k, v) in headers {
                request = request.header(k, v);
            }
            let response = request.send().await?;
            Ok(HeadInfo {
                status: response.status().as_u16(),
                content_length: response.content_length(),
                accept_ranges: response
                    .headers()
                    .get(reqwest::header::ACCEPT_RANGES)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.eq_ignore_ascii_case("bytes"))
                    .unwrap_or(false),
                etag: header_str(&response, reqwest::header::ETAG),
                last_modified: header_str(&response, reqwest::header::LAST_MODIFIED),
            })
        }

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
            range: Option<(u64, Option<u64>)>,
        ) -> std::result::Result<GetResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);
            for (k, v) in headers {
                request = request.header(k, v);
            }
            if let Some((start, end)) = range {
                let value = match end {
                    Some(end) => format!("bytes={start}-{end}"),
                    None => format!("bytes={start}-"),
                };
                request = request.header(reqwest::header::RANGE, value);
            }

            let response = request.send().await?;
            let status = response.status().as_u16();
            let content_length = response.content_length();
            let content_range_total = response
                .headers()
                .get(reqwest::header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.rsplit('/').next())
                .and_then(|v| v.parse::<u64>().ok());
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let www_authenticate = response.headers().contains_key(reqwest::header::WWW_AUTHENTICATE);

            let body = response.bytes_stream();
            Ok(GetResponse {
                status,
                content_length,
                content_range_total,
                retry_after,
                www_authenticate,
                body: Box::pin(body),
            })
        }
    }

    /// `Retry-After` is delta-seconds or an RFC 1123 HTTP-date (RFC 7231
    /// section 7.1.3); a date in the past collapses to a zero delay rather
    /// than erroring, since the server's wait is already over.
    pub(crate) fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        let value = value.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(std::time::Duration::from_secs(seconds));
        }
        let target = chrono::DateTime::parse_from_rfc2822(value).ok()?;
        let delta = target.with_timezone(&chrono::Utc) - chrono::Utc::now();
        Some(delta.to_std().unwrap_or_default())
    }

    fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub use reqwest_client::{ClientOptions, ReqwestClient};

#[cfg(test)]
mod tests {
    use super::reqwest_client::parse_retry_after;

    #[test]
    fn parses_delta_seconds() {
        assert_eq!(parse_retry_after("120"), Some(std::time::Duration::from_secs(120)));
    }

    #[test]
    fn parses_http_date_in_the_future() {
        let future = chrono::Utc::now() + chrono::Duration::seconds(60);
        let header = future.to_rfc2822();
        let parsed = parse_retry_after(&header).expect("should parse RFC 1123 date");
        assert!(parsed.as_secs() <= 61);
    }

    #[test]
    fn http_date_in_the_past_is_zero_delay() {
        let past = chrono::Utc::now() - chrono::Duration::seconds(60);
        let header = past.to_rfc2822();
        assert_eq!(parse_retry_after(&header), Some(std::time::Duration::ZERO));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_retry_after("not-a-date"), None);
    }
}
