//! Proxy selection for remote repository transfers.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use quarry_core::Authentication;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    Direct,
    Http,
    Socks,
}

/// One entry returned by a [`ProxySelector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCandidate {
    pub kind: ProxyType,
    pub host: String,
    pub port: u16,
}

impl ProxyCandidate {
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProxyType::Http,
            host: host.into(),
            port,
        }
    }
}

/// Platform proxy configuration.
pub trait ProxySelector: Send + Sync {
    fn select(&self, url: &Url) -> io::Result<Vec<ProxyCandidate>>;
}

/// Interactive or system credential source consulted on a proxy authentication challenge.
pub trait ProxyAuthenticator: Send + Sync {
    fn credentials(&self, host: &str, port: u16, protocol: &str) -> Option<Authentication>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProxyAuthenticator;

impl ProxyAuthenticator for NoProxyAuthenticator {
    fn credentials(&self, _host: &str, _port: u16, _protocol: &str) -> Option<Authentication> {
        None
    }
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Reads the conventional `http_proxy`, `https_proxy`, `all_proxy` and `no_proxy` variables,
/// lower case first.
pub struct EnvProxySelector {
    lookup: Box<EnvLookup>,
}

impl fmt::Debug for EnvProxySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvProxySelector").finish_non_exhaustive()
    }
}

impl Default for EnvProxySelector {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl EnvProxySelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .or_else(|| (self.lookup)(&name.to_ascii_uppercase()))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn bypasses(&self, host: &str) -> bool {
        let Some(no_proxy) = self.var("no_proxy") else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        no_proxy
            .split(',')
            .map(|entry| entry.trim().to_ascii_lowercase())
            .filter(|entry| !entry.is_empty())
            .any(|entry| {
                if entry == "*" {
                    return true;
                }
                let domain = entry.trim_start_matches('*').trim_start_matches('.');
                host == domain || host.ends_with(&format!(".{domain}"))
            })
    }
}

impl ProxySelector for EnvProxySelector {
    fn select(&self, url: &Url) -> io::Result<Vec<ProxyCandidate>> {
        let host = url.host_str().unwrap_or_default();
        if self.bypasses(host) {
            return Ok(vec![]);
        }

        let value = match url.scheme() {
            "https" => self.var("https_proxy"),
            "http" => self.var("http_proxy"),
            _ => None,
        }
        .or_else(|| self.var("all_proxy"));
        let Some(value) = value else {
            return Ok(vec![]);
        };

        let with_scheme = if value.contains("://") {
            value
        } else {
            format!("http://{value}")
        };
        let proxy_url = Url::parse(&with_scheme)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let kind = if proxy_url.scheme().starts_with("socks") {
            ProxyType::Socks
        } else {
            ProxyType::Http
        };
        let port = proxy_url.port_or_known_default().unwrap_or(match kind {
            ProxyType::Socks => 1080,
            _ => 80,
        });

        Ok(vec![ProxyCandidate {
            kind,
            host: proxy_url.host_str().unwrap_or_default().to_string(),
            port,
        }])
    }
}

/// Protocol the proxy is used for, derived from the target url.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyFlavor {
    Http,
    Https,
}

impl ProxyFlavor {
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    #[must_use]
    pub fn protocol(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// A proxy chosen for one target url.
#[derive(Clone)]
pub struct Proxy {
    pub flavor: ProxyFlavor,
    pub host: String,
    pub port: u16,
    authenticator: Arc<dyn ProxyAuthenticator>,
    properties: Arc<BTreeMap<String, String>>,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("flavor", &self.flavor)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Proxy {
    /// Credentials for answering a 407 challenge.
    ///
    /// The authenticator is asked first; otherwise `<protocol>.proxyUser` and
    /// `<protocol>.proxyPassword` are looked up in the configured properties.
    pub fn authentication(&self) -> Option<Authentication> {
        let protocol = self.flavor.protocol();
        if let Some(auth) = self
            .authenticator
            .credentials(&self.host, self.port, protocol)
        {
            return Some(auth);
        }

        let username = self.properties.get(&format!("{protocol}.proxyUser"))?;
        let password = self
            .properties
            .get(&format!("{protocol}.proxyPassword"))
            .cloned()
            .unwrap_or_default();
        Some(Authentication {
            username: username.clone(),
            password,
        })
    }

    /// `http://[user:password@]host:port`, the form ureq expects.
    pub(crate) fn url(&self, auth: Option<&Authentication>) -> String {
        match auth {
            Some(auth) => format!(
                "http://{}:{}@{}:{}",
                percent_encode_userinfo(&auth.username),
                percent_encode_userinfo(&auth.password),
                self.host,
                self.port
            ),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

fn percent_encode_userinfo(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Picks the proxy for a repository url; never fails.
#[derive(Clone)]
pub struct ProxyAdapter {
    selector: Arc<dyn ProxySelector>,
    authenticator: Arc<dyn ProxyAuthenticator>,
    properties: Arc<BTreeMap<String, String>>,
}

impl fmt::Debug for ProxyAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAdapter")
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for ProxyAdapter {
    fn default() -> Self {
        Self::new(Arc::new(EnvProxySelector::new()))
    }
}

impl ProxyAdapter {
    pub fn new(selector: Arc<dyn ProxySelector>) -> Self {
        Self {
            selector,
            authenticator: Arc::new(NoProxyAuthenticator),
            properties: Arc::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn ProxyAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Properties such as `https.proxyUser` used when the authenticator has nothing.
    #[must_use]
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = Arc::new(properties);
        self
    }

    pub fn proxy_for(&self, url: &Url) -> Option<Proxy> {
        let flavor = ProxyFlavor::for_scheme(url.scheme())?;
        let candidates = match self.selector.select(url) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::debug!(
                    target = "quarry.transport",
                    url = %crate::sanitize_url(url.as_str()),
                    error = %err,
                    "proxy selection failed; connecting directly"
                );
                return None;
            }
        };

        // Auto-detection can report `HTTP @ :0` entries; they are not usable proxies.
        let candidate = candidates.into_iter().find(|candidate| {
            candidate.kind == ProxyType::Http && !candidate.host.is_empty() && candidate.port > 0
        })?;

        Some(Proxy {
            flavor,
            host: candidate.host,
            port: candidate.port,
            authenticator: Arc::clone(&self.authenticator),
            properties: Arc::clone(&self.properties),
        })
    }
}
