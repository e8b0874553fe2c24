//! Authenticated HTTP session with one camera.
//!
//! Uses the curl crate (libcurl) with HTTP digest authentication. A
//! `CameraSession` is an explicit handle passed to the locator and fetcher;
//! there is no process-wide session state.

mod transfer;

use curl::easy::{Auth, Easy};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Camera login. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Timeouts applied to camera requests.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub connect: Duration,
    /// Short control requests (finder create/destroy).
    pub request: Duration,
    /// Search requests (`findFile`, `findNextFile`).
    pub search: Duration,
    /// File transfers abort when throughput stays under 1 KiB/s this long.
    pub low_speed: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(10),
            search: Duration::from_secs(30),
            low_speed: Duration::from_secs(60),
        }
    }
}

/// Error from a plain (non-streaming) camera request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Status(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid camera host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Authenticated session handle for one camera.
#[derive(Debug, Clone)]
pub struct CameraSession {
    base: String,
    credentials: Credentials,
    timeouts: SessionTimeouts,
}

impl CameraSession {
    /// `host` is an address like `192.168.1.108`, `cam.local:8080` or a full
    /// `http://` base URL.
    pub fn new(
        host: &str,
        credentials: Credentials,
        timeouts: SessionTimeouts,
    ) -> Result<Self, SessionError> {
        let host = host.trim();
        let candidate = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let url = Url::parse(&candidate).map_err(|e| SessionError::InvalidHost {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(SessionError::InvalidHost {
                host: host.to_string(),
                reason: "missing host name".to_string(),
            });
        }
        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
            credentials,
            timeouts,
        })
    }

    /// Base URL without trailing slash, e.g. `http://192.168.1.108`.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn timeouts(&self) -> &SessionTimeouts {
        &self.timeouts
    }

    /// Build `base + endpoint + ?k=v&...` with every key and value percent-encoded
    /// (spaces as `%20`, which the camera CGI expects).
    pub fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> String {
        let mut url = self.base.clone();
        if !endpoint.starts_with('/') {
            url.push('/');
        }
        url.push_str(endpoint);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    /// URL of a recording payload. The camera path is appended verbatim.
    pub fn file_url(&self, remote_path: &str) -> String {
        let mut url = format!("{}/cgi-bin/RPC_Loadfile", self.base);
        if !remote_path.starts_with('/') {
            url.push('/');
        }
        url.push_str(remote_path);
        url
    }

    /// GET a text endpoint and return the body (lossy UTF-8).
    ///
    /// Runs in the current thread; call from `spawn_blocking` if used from async code.
    pub fn get_text(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, HttpError> {
        let url = self.endpoint_url(endpoint, params);
        let mut body = Vec::new();
        let mut easy = self.easy(&url, timeout)?;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(HttpError::Status(code));
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// New curl handle with credentials, digest auth and timeouts applied.
    fn easy(&self, url: &str, timeout: Duration) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.username(&self.credentials.username)?;
        easy.password(&self.credentials.password)?;
        let mut auth = Auth::new();
        auth.digest(true);
        easy.http_auth(&auth)?;
        easy.connect_timeout(self.timeouts.connect)?;
        easy.timeout(timeout)?;
        Ok(easy)
    }
}

fn encode_component(s: &str) -> String {
    // byte_serialize emits '+' for space and escapes a literal '+' as %2B.
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
