//! HTTP `Source`: probing for size/resumability/filename, and issuing
//! ranged GETs. The final URL reached after following redirects is
//! captured for filename derivation and resumability reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, RANGE, USER_AGENT,
};
use tokio_util::io::StreamReader;

use crate::error::PartdecError;
use crate::range::{ByteRange, UNKNOWN_SIZE};

use super::{BoxReader, Source};

const USER_AGENT_VALUE: &str = concat!("partdec/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Final URL after following redirects.
    pub final_url: String,
    /// `true` if the URL changed during probing.
    pub redirected: bool,
    /// Content length, or `UNKNOWN_SIZE` if absent/unparseable.
    pub size: i64,
    /// Whether the server advertised `Accept-Ranges: bytes` together with
    /// a known, non-negative `Content-Length`, i.e. whether multi-part
    /// fetch is possible.
    pub resumable: bool,
    /// Filename derived from `Content-Disposition`, falling back to the
    /// final URL's last path segment.
    pub filename: Option<String>,
}

/// Probes `url` with a `HEAD` request, headers only. Resumability is
/// `Accept-Ranges: bytes` plus a known, non-negative `Content-Length`; if
/// `HEAD` comes back with no length (some servers answer it inconsistently
/// with `GET`), falls back to a `GET` that reads headers only and discards
/// the body rather than ever issuing a real ranged partial-content request
/// during planning.
pub async fn probe(
    client: &reqwest::Client,
    url: &str,
    extra_headers: &HeaderMap,
    timeout: Duration,
) -> Result<ProbeResult, PartdecError> {
    let mut headers = extra_headers.clone();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    let resp = send_with_timeout(client.head(url).headers(headers.clone()), timeout).await?;
    let (final_url, redirected, resumable, size, filename) = inspect_response(&resp, url);

    if size != UNKNOWN_SIZE {
        return Ok(ProbeResult { final_url, redirected, size, resumable, filename });
    }

    // HEAD gave no usable length — fall back to a GET, but only to read
    // its headers; the body is dropped unread.
    let resp = send_with_timeout(client.get(url).headers(headers), timeout).await?;
    let (final_url, redirected, resumable, size, filename) = inspect_response(&resp, url);
    drop(resp);

    Ok(ProbeResult { final_url, redirected, size, resumable, filename })
}

fn inspect_response(resp: &reqwest::Response, requested_url: &str) -> (String, bool, bool, i64, Option<String>) {
    let final_url = resp.url().to_string();
    let redirected = final_url != requested_url;

    let accepts_ranges = resp
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    let size = resp
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|&n| n >= 0)
        .unwrap_or(UNKNOWN_SIZE);

    let resumable = accepts_ranges && size != UNKNOWN_SIZE;

    let filename = resp
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_filename)
        .or_else(|| filename_from_url(&final_url));

    (final_url, redirected, resumable, size, filename)
}

/// Awaits a request's headers (`.send()`) within `timeout`; never bounds
/// the subsequent body stream, which is read separately by the caller.
async fn send_with_timeout(req: reqwest::RequestBuilder, timeout: Duration) -> Result<reqwest::Response, PartdecError> {
    match tokio::time::timeout(timeout, req.send()).await {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(e)) => Err(PartdecError::Network(e)),
        Err(_) => Err(PartdecError::Timeout),
    }
}

/// Extracts a filename from a `Content-Disposition` header value, preferring
/// the RFC 5987 `filename*` extended parameter over the plain `filename`
/// parameter when both are present.
fn extract_filename(value: &str) -> Option<String> {
    extract_filename_star(value).or_else(|| extract_filename_plain(value))
}

fn extract_filename_star(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("filename*=") {
            // Expected form: UTF-8''percent-encoded-name
            let rest = rest.trim_matches('"');
            let encoded = rest.split("''").nth(1).unwrap_or(rest);
            return percent_decode(encoded);
        }
    }
    None
}

fn extract_filename_plain(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("filename=") {
            let name = rest.trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn percent_decode(s: &str) -> Option<String> {
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last = without_query.rsplit('/').next()?;
    if last.is_empty() {
        None
    } else {
        percent_decode(last).or_else(|| Some(last.to_string()))
    }
}

/// An HTTP(S) source. One `HttpSource` corresponds to one live connection
/// slot in the pool; `data_cast` issues a fresh ranged GET each time it is
/// called, since reqwest connections aren't separately addressable once a
/// body stream has started.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    extra_headers: HeaderMap,
    /// Per-response-header deadline — bounds `.send()` only, never the
    /// body stream returned from `data_cast`.
    timeout: Duration,
    open: AtomicBool,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: String, extra_headers: HeaderMap, timeout: Duration) -> Arc<Self> {
        Arc::new(HttpSource { client, url, extra_headers, timeout, open: AtomicBool::new(false) })
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn data_cast(&self, range: ByteRange) -> Result<BoxReader, PartdecError> {
        let mut headers = self.extra_headers.clone();
        let start = range.effective_start();

        // A full-range part fetched from the very first byte needs no
        // Range header at all — this is the common case for an unknown-
        // size or single-part download, and avoids depending on range
        // support for a plain, unbounded GET. Any user-supplied Range
        // header is dropped here too: the controller owns range semantics
        // once a plan exists, so a stray `-H Range: ...` can't desync a
        // part's on-disk offset from what it actually requests.
        if range.is_full_range && start == 0 {
            headers.remove(RANGE);
        } else {
            let range_value = if range.end == UNKNOWN_SIZE {
                format!("bytes={start}-")
            } else {
                format!("bytes={start}-{}", range.end)
            };
            headers.insert(RANGE, HeaderValue::from_str(&range_value).map_err(|e| PartdecError::Parse(e.to_string()))?);
        }

        let resp = send_with_timeout(self.client.get(&self.url).headers(headers), self.timeout).await?;
        if !resp.status().is_success() {
            return Err(PartdecError::Network(
                resp.error_for_status().unwrap_err(),
            ));
        }

        self.open.store(true, Ordering::SeqCst);

        let stream = resp
            .bytes_stream()
            .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        Ok(Box::pin(StreamReader::new(stream)))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_filename() {
        let v = r#"attachment; filename="movie.mp4""#;
        assert_eq!(extract_filename(v).as_deref(), Some("movie.mp4"));
    }

    #[test]
    fn prefers_star_variant_over_plain() {
        let v = r#"attachment; filename="fallback.mp4"; filename*=UTF-8''na%C3%AFve.mp4"#;
        assert_eq!(extract_filename(v).as_deref(), Some("naïve.mp4"));
    }

    #[test]
    fn filename_from_url_strips_query() {
        assert_eq!(filename_from_url("https://example.com/a/movie.mp4?x=1").as_deref(), Some("movie.mp4"));
    }

    #[test]
    fn filename_from_url_none_for_trailing_slash() {
        assert_eq!(filename_from_url("https://example.com/a/"), None);
    }
}
