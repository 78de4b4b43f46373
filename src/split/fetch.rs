//! Synchronous diff download with pacing, retries, and cache write-through.
//!
//! One request in flight at any time. GitHub web diff URLs are converted to
//! their API form so the `Accept` header can request diff format, and
//! requests to the same host are spaced out to stay under archive rate
//! limits.

use std::collections::HashMap;
use std::env;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::FetchConfig;
use crate::core::errors::{MaiError, Result};
use crate::split::atomic::DiffSource;
use crate::split::cache::DiffCache;

/// Default wait before retrying a rate-limited request, when the server
/// does not say.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Synchronous HTTP diff fetcher.
pub struct DiffFetcher {
    agent: ureq::Agent,
    config: FetchConfig,
    token: Option<String>,
    last_hit: HashMap<String, Instant>,
}

impl DiffFetcher {
    /// Build a fetcher. A `GITHUB_TOKEN` environment variable, when set,
    /// authenticates every request.
    #[must_use]
    pub fn new(config: FetchConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        if token.is_none() {
            eprintln!("[MAI-FETCH] no GITHUB_TOKEN in environment, using unauthenticated requests");
        }
        Self {
            agent,
            config,
            token,
            last_hit: HashMap::new(),
        }
    }

    /// Fetch the diff text behind `url`.
    ///
    /// Transport errors retry up to `max_retries` with linear backoff; a 429
    /// honors `Retry-After` for a single retry; 404 maps to
    /// [`MaiError::DiffVanished`].
    pub fn fetch(&mut self, url: &str) -> Result<String> {
        let api_url = convert_to_api_url(url);
        let mut transport_attempts = 0u32;
        let mut retried_rate_limit = false;

        loop {
            self.pace(&api_url);

            match self.request(&api_url) {
                Ok(response) => {
                    let mut text = String::new();
                    response
                        .into_reader()
                        .read_to_string(&mut text)
                        .map_err(|e| MaiError::Fetch {
                            url: api_url.clone(),
                            details: format!("reading body: {e}"),
                        })?;
                    return Ok(text);
                }
                Err(ureq::Error::Status(404, _)) => {
                    return Err(MaiError::DiffVanished { url: api_url });
                }
                Err(ureq::Error::Status(429, response)) => {
                    if retried_rate_limit {
                        return Err(MaiError::Fetch {
                            url: api_url,
                            details: "rate limited twice (HTTP 429)".to_string(),
                        });
                    }
                    retried_rate_limit = true;
                    let wait = response
                        .header("Retry-After")
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    eprintln!("[MAI-FETCH] 429 from {api_url}, sleeping {wait}s");
                    thread::sleep(Duration::from_secs(wait));
                }
                Err(ureq::Error::Status(code, _)) => {
                    return Err(MaiError::Fetch {
                        url: api_url,
                        details: format!("HTTP {code}"),
                    });
                }
                Err(ureq::Error::Transport(transport)) => {
                    transport_attempts += 1;
                    if transport_attempts > self.config.max_retries {
                        return Err(MaiError::Fetch {
                            url: api_url,
                            details: transport.to_string(),
                        });
                    }
                    let backoff = self.config.retry_backoff_ms * u64::from(transport_attempts);
                    thread::sleep(Duration::from_millis(backoff));
                }
            }
        }
    }

    fn request(&self, url: &str) -> std::result::Result<ureq::Response, ureq::Error> {
        let mut req = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github.v3.diff");
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("token {token}"));
        }
        req.call()
    }

    /// Enforce minimum spacing between requests to the same host.
    fn pace(&mut self, url: &str) {
        let Some(host) = host_of(url) else {
            return;
        };
        if let Some(&pacing_ms) = self.config.host_pacing_ms.get(host) {
            let spacing = Duration::from_millis(pacing_ms);
            if let Some(last) = self.last_hit.get(host) {
                let elapsed = last.elapsed();
                if elapsed < spacing {
                    thread::sleep(spacing - elapsed);
                }
            }
        }
        self.last_hit.insert(host.to_string(), Instant::now());
    }
}

/// Convert a GitHub web diff URL to its API form.
///
/// `https://github.com/{owner}/{repo}/pull/{n}.diff` becomes
/// `https://api.github.com/repos/{owner}/{repo}/pulls/{n}`; anything else
/// passes through unchanged.
#[must_use]
pub fn convert_to_api_url(web_url: &str) -> String {
    let Some(path) = path_of(web_url) else {
        return web_url.to_string();
    };

    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    if parts.len() >= 4 && parts[parts.len() - 1].ends_with(".diff") {
        let owner = parts[0];
        let repo = parts[1];
        let pr_number = parts[3].trim_end_matches(".diff");
        return format!("https://api.github.com/repos/{owner}/{repo}/pulls/{pr_number}");
    }
    web_url.to_string()
}

/// Host portion of a URL, without userinfo or port.
fn host_of(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("://")?.1;
    let authority = after_scheme.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    host.split(':').next().filter(|h| !h.is_empty())
}

fn path_of(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("://")?.1;
    after_scheme.split_once('/').map(|(_, path)| path)
}

/// Diff source that consults the cache first and writes fetched diffs back.
pub struct FetchingSource {
    cache: DiffCache,
    fetcher: DiffFetcher,
}

impl FetchingSource {
    #[must_use]
    pub fn new(cache: DiffCache, fetcher: DiffFetcher) -> Self {
        Self { cache, fetcher }
    }
}

impl DiffSource for FetchingSource {
    fn diff_text(&mut self, url: &str) -> Result<String> {
        if let Some(cached) = self.cache.lookup(url) {
            return Ok(cached);
        }
        let text = self.fetcher.fetch(url)?;
        if let Err(err) = self.cache.store(url, &text) {
            // A cold cache next run beats dropping the record now.
            eprintln!("[MAI-FETCH] warning: failed to cache diff for {url}: {err}");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_web_diff_url() {
        assert_eq!(
            convert_to_api_url("https://github.com/rust-lang/rust/pull/123.diff"),
            "https://api.github.com/repos/rust-lang/rust/pulls/123"
        );
    }

    #[test]
    fn leaves_other_urls_alone() {
        for url in [
            "https://api.github.com/repos/o/r/pulls/5",
            "https://github.com/o/r/pull/7",
            "https://example.com/x.diff",
            "not a url",
        ] {
            assert_eq!(convert_to_api_url(url), url);
        }
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://api.github.com/x/y"), Some("api.github.com"));
        assert_eq!(host_of("https://host:8080/x"), Some("host"));
        assert_eq!(host_of("https://user@host/x"), Some("host"));
        assert_eq!(host_of("no scheme"), None);
    }

    #[test]
    fn pacing_spaces_out_same_host_requests() {
        let mut config = FetchConfig::default();
        config.host_pacing_ms.clear();
        config
            .host_pacing_ms
            .insert("example.com".to_string(), 50);

        let mut fetcher = DiffFetcher {
            agent: ureq::AgentBuilder::new().build(),
            config,
            token: None,
            last_hit: HashMap::new(),
        };

        let start = Instant::now();
        fetcher.pace("https://example.com/a");
        fetcher.pace("https://example.com/b");
        assert!(start.elapsed() >= Duration::from_millis(50));

        // Unpaced hosts do not sleep.
        let start = Instant::now();
        fetcher.pace("https://other.test/a");
        fetcher.pace("https://other.test/b");
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
