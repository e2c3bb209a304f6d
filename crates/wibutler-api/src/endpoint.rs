// Hub endpoint: scheme, host and port, plus the URL builders for the REST
// API and the push stream.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Default REST/stream port of the hub.
pub const DEFAULT_PORT: u16 = 8081;

/// Network location of a hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    use_tls: bool,
}

impl Endpoint {
    /// Build an endpoint from host-supplied settings.
    ///
    /// The host may be given with a scheme (`https://hub.local`); only the
    /// hostname is kept, the scheme is decided by `use_tls`.
    pub fn new(host: &str, port: u16, use_tls: bool) -> Result<Self, Error> {
        let host = strip_scheme(host.trim())?;
        if host.is_empty() {
            return Err(Error::InvalidUrl(url::ParseError::EmptyHost));
        }
        let endpoint = Self {
            host,
            port,
            use_tls,
        };
        // Fail early on hosts that cannot form a URL.
        endpoint.api_base()?;
        Ok(endpoint)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    fn http_scheme(&self) -> &'static str {
        if self.use_tls { "https" } else { "http" }
    }

    fn ws_scheme(&self) -> &'static str {
        if self.use_tls { "wss" } else { "ws" }
    }

    /// `{scheme}://{host}:{port}/api/`
    pub fn api_base(&self) -> Result<Url, Error> {
        let base = format!("{}://{}:{}/api/", self.http_scheme(), self.host, self.port);
        Ok(Url::parse(&base)?)
    }

    /// Resolve an API-relative path such as `"devices"` or `"login"`.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_base()?.join(path.trim_start_matches('/'))?)
    }

    /// Build an API URL from raw path segments, percent-encoding each one.
    pub fn api_url_segments<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, Error> {
        let mut url = self.api_base()?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `{ws|wss}://{host}:{port}/api/stream/{token}`
    pub fn stream_url(&self, token: &SecretString) -> Result<Url, Error> {
        let base = format!("{}://{}:{}/api/", self.ws_scheme(), self.host, self.port);
        let mut url = Url::parse(&base)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty()
                .extend(["stream", token.expose_secret()]);
        }
        Ok(url)
    }

    /// Stream URL with the token segment masked, for logging.
    pub fn redacted_stream_url(&self) -> String {
        format!(
            "{}://{}:{}/api/stream/***",
            self.ws_scheme(),
            self.host,
            self.port
        )
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.http_scheme(), self.host, self.port)
    }
}

fn strip_scheme(host: &str) -> Result<String, Error> {
    if !host.contains("://") {
        return Ok(host.trim_end_matches('/').to_owned());
    }
    let parsed = Url::parse(host)?;
    parsed
        .host_str()
        .map(str::to_owned)
        .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))
}
