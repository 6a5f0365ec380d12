//! C3 — HEAD-first capability probe with a ranged-GET fallback, and
//! per-host capability caching in the state store.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use modfetch_store::{HostCapsRecord, Store};

use crate::error::{network_error, FetchError, Result};
use crate::http::HttpClient;

#[derive(Clone, Debug, Default)]
pub struct ProbeOutcome {
    pub size: Option<u64>,
    pub accept_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Whether a plain HEAD succeeded, or we had to fall back to a ranged
    /// GET to infer capabilities (spec 4.3).
    pub head_ok: bool,
}

pub fn host_of(url: &str) -> Result<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| FetchError::ProtocolOther(format!("cannot determine host for {url}")))
}

/// `true` if `caps` is still within `cache_ttl` of its `updated_at` and
/// reports a plain HEAD succeeded — spec 4.3: "Results cached in HostCaps
/// for subsequent downloads against the same host within TTL."
pub fn caps_fresh(caps: &HostCapsRecord, cache_ttl: Duration, now: chrono::DateTime<Utc>) -> bool {
    match now.signed_duration_since(caps.updated_at).to_std() {
        Ok(age) => age < cache_ttl,
        Err(_) => false,
    }
}

/// Issue a HEAD (falling back to a ranged `bytes=0-0` GET on any non-2xx
/// response or network error), and persist the host's range-support
/// capability so later probes against the same host can consult it.
pub async fn probe<C: HttpClient>(
    client: &C,
    store: &Store,
    url: &str,
    headers: &[(String, String)],
) -> Result<ProbeOutcome> {
    let host = host_of(url)?;

    let head = match client.head(url, headers).await {
        Ok(info) if (200..300).contains(&info.status) => Some(info),
        Ok(info) => {
            debug!(url, status = info.status, "HEAD refused, falling back to ranged GET");
            None
        }
        Err(e) => {
            warn!(url, error = %e, "HEAD request failed, falling back to ranged GET");
            None
        }
    };

    let outcome = match head {
        Some(info) => ProbeOutcome {
            size: info.content_length,
            accept_ranges: info.accept_ranges,
            etag: info.etag,
            last_modified: info.last_modified,
            head_ok: true,
        },
        None => probe_via_ranged_get(client, url, headers).await?,
    };

    store.upsert_host_caps(&HostCapsRecord {
        host,
        head_ok: outcome.head_ok,
        accept_ranges: outcome.accept_ranges,
        updated_at: Utc::now(),
    })?;

    Ok(outcome)
}

async fn probe_via_ranged_get<C: HttpClient>(
    client: &C,
    url: &str,
    headers: &[(String, String)],
) -> Result<ProbeOutcome> {
    let response = client
        .get(url, headers, Some((0, Some(0))))
        .await
        .map_err(|e| network_error(&e))?;

    match response.status {
        206 => Ok(ProbeOutcome {
            size: response.content_range_total.or(response.content_length),
            accept_ranges: true,
            etag: None,
            last_modified: None,
            head_ok: false,
        }),
        200 => Ok(ProbeOutcome {
            size: response.content_length,
            accept_ranges: false,
            etag: None,
            last_modified: None,
            head_ok: false,
        }),
        401 | 403 => Err(FetchError::AuthRequired { status: response.status }),
        404 => Err(FetchError::NotFound(url.to_string())),
        429 => Err(FetchError::RateLimited { retry_after: response.retry_after }),
        s if (500..600).contains(&s) => Err(FetchError::ProtocolOther(format!("HTTP {s} probing {url}"))),
        s => Err(FetchError::ProtocolOther(format!("unexpected status {s} probing {url}"))),
    }
}
