use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use quarry_core::{Authentication, RemoteRepository};

use crate::error::{Result, TransportError};
use crate::proxy::{Proxy, ProxyAdapter};
use crate::redact::sanitize_url;
use crate::transfer::{TransferEvent, TransferEventKind, TransferListener};

const BUFFER_SIZE: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches layout-relative resources from one remote repository.
pub trait Transporter: Send + Sync {
    fn repository(&self) -> &RemoteRepository;

    /// Download `resource` into `dest`, replacing it atomically on success.
    fn get(&self, resource: &str, dest: &Path, listener: &dyn TransferListener) -> Result<()>;
}

/// Pick the transporter for the repository's url scheme.
pub fn transporter_for(
    repository: &RemoteRepository,
    proxies: &ProxyAdapter,
) -> Result<Box<dyn Transporter>> {
    match repository.scheme() {
        "http" | "https" => Ok(Box::new(HttpTransporter::new(repository.clone(), proxies))),
        "file" => Ok(Box::new(FileTransporter::new(repository.clone()))),
        _ => Err(TransportError::UnsupportedUrl {
            url: sanitize_url(repository.url().as_str()),
        }),
    }
}

/// Runs `transfer` between the initiated and succeeded/failed events.
fn with_events(
    url: &str,
    listener: &dyn TransferListener,
    transfer: impl FnOnce() -> Result<u64>,
) -> Result<()> {
    let result = listener
        .on_event(&TransferEvent::new(TransferEventKind::Initiated, url))
        .and_then(|()| transfer());

    match result {
        Ok(transferred) => {
            let mut event = TransferEvent::new(TransferEventKind::Succeeded, url);
            event.transferred = transferred;
            listener.on_event(&event)
        }
        Err(err) => {
            let mut event = TransferEvent::new(TransferEventKind::Failed, url);
            event.error = Some(err.to_string());
            if let Err(listener_err) = listener.on_event(&event) {
                tracing::debug!(
                    target = "quarry.transport",
                    url,
                    error = %listener_err,
                    "transfer listener rejected failure event"
                );
            }
            Err(err)
        }
    }
}

/// Stream `reader` into `dest`, firing started/progressed events.
fn write_with_progress(
    url: &str,
    mut reader: impl Read,
    content_length: Option<u64>,
    dest: &Path,
    listener: &dyn TransferListener,
) -> Result<u64> {
    let mut started = TransferEvent::new(TransferEventKind::Started, url);
    started.content_length = content_length;
    listener.on_event(&started)?;

    let mut aborted = None;
    let mut transferred = 0u64;
    let written = quarry_local::write_replacing(dest, |out| {
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            let read = match reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            out.write_all(&buf[..read])?;
            transferred += read as u64;

            let mut progressed = TransferEvent::new(TransferEventKind::Progressed, url);
            progressed.transferred = transferred;
            progressed.content_length = content_length;
            if let Err(err) = listener.on_event(&progressed) {
                aborted = Some(err);
                return Err(io::Error::other("transfer aborted by listener"));
            }
        }
    });

    if let Some(err) = aborted {
        return Err(err);
    }
    written.map_err(|source| TransportError::Io {
        url: url.to_string(),
        source,
    })?;
    Ok(transferred)
}

/// Reads from `file://` repositories.
#[derive(Debug, Clone)]
pub struct FileTransporter {
    repository: RemoteRepository,
}

impl FileTransporter {
    pub fn new(repository: RemoteRepository) -> Self {
        Self { repository }
    }
}

impl Transporter for FileTransporter {
    fn repository(&self) -> &RemoteRepository {
        &self.repository
    }

    fn get(&self, resource: &str, dest: &Path, listener: &dyn TransferListener) -> Result<()> {
        let url = self.repository.resource_url(resource)?;
        let safe_url = sanitize_url(url.as_str());
        let path = url
            .to_file_path()
            .map_err(|()| TransportError::UnsupportedUrl {
                url: safe_url.clone(),
            })?;

        with_events(&safe_url, listener, || {
            if !path.is_file() {
                return Err(TransportError::NotFound {
                    url: safe_url.clone(),
                });
            }
            let file = File::open(&path).map_err(|source| TransportError::Io {
                url: safe_url.clone(),
                source,
            })?;
            let length = file.metadata().ok().map(|meta| meta.len());
            write_with_progress(&safe_url, file, length, dest, listener)
        })
    }
}

/// Fetches from `http://` and `https://` repositories with ureq.
///
/// Repository credentials are sent as basic auth. A proxy chosen by the [`ProxyAdapter`] is
/// first used anonymously; on a 407 challenge the request is repeated once with the proxy's
/// credentials.
pub struct HttpTransporter {
    repository: RemoteRepository,
    proxy: Option<Proxy>,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpTransporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransporter")
            .field("repository", &self.repository)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl HttpTransporter {
    pub fn new(repository: RemoteRepository, proxies: &ProxyAdapter) -> Self {
        let proxy = proxies.proxy_for(repository.url());
        let agent = build_agent(proxy.as_ref(), None);
        Self {
            repository,
            proxy,
            agent,
        }
    }

    fn call(&self, agent: &ureq::Agent, url: &str) -> std::result::Result<ureq::Response, ureq::Error> {
        let mut request = agent.get(url);
        if let Some(auth) = &self.repository.authentication {
            request = request.set("Authorization", &basic_auth(auth));
        }
        request.call()
    }

    fn fetch(&self, url: &str, safe_url: &str) -> Result<ureq::Response> {
        let response = match self.call(&self.agent, url) {
            Err(err) if is_proxy_challenge(&err) => match &self.proxy {
                Some(proxy) => match proxy.authentication() {
                    Some(auth) => {
                        tracing::debug!(
                            target = "quarry.transport",
                            url = safe_url,
                            proxy_host = %proxy.host,
                            proxy_port = proxy.port,
                            "retrying with proxy credentials"
                        );
                        let agent = build_agent(Some(proxy), Some(&auth));
                        self.call(&agent, url)
                    }
                    None => Err(err),
                },
                None => Err(err),
            },
            other => other,
        };
        response.map_err(|err| map_ureq_error(err, safe_url))
    }
}

impl Transporter for HttpTransporter {
    fn repository(&self) -> &RemoteRepository {
        &self.repository
    }

    fn get(&self, resource: &str, dest: &Path, listener: &dyn TransferListener) -> Result<()> {
        let url = self.repository.resource_url(resource)?;
        let safe_url = sanitize_url(url.as_str());

        with_events(&safe_url, listener, || {
            let response = self.fetch(url.as_str(), &safe_url)?;
            let content_length = response
                .header("Content-Length")
                .and_then(|value| value.trim().parse::<u64>().ok());
            tracing::debug!(
                target = "quarry.transport",
                url = %safe_url,
                status = response.status(),
                content_length,
                "downloading"
            );
            write_with_progress(
                &safe_url,
                response.into_reader(),
                content_length,
                dest,
                listener,
            )
        })
    }
}

fn build_agent(proxy: Option<&Proxy>, auth: Option<&Authentication>) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(READ_TIMEOUT)
        .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")));
    if let Some(proxy) = proxy {
        match ureq::Proxy::new(proxy.url(auth)) {
            Ok(ureq_proxy) => builder = builder.proxy(ureq_proxy),
            Err(err) => tracing::warn!(
                target = "quarry.transport",
                proxy_host = %proxy.host,
                proxy_port = proxy.port,
                error = %err,
                "ignoring unusable proxy"
            ),
        }
    }
    builder.build()
}

fn basic_auth(auth: &Authentication) -> String {
    let token = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", auth.username, auth.password));
    format!("Basic {token}")
}

fn is_proxy_challenge(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(407, _) => true,
        ureq::Error::Transport(transport) => {
            transport.kind() == ureq::ErrorKind::ProxyUnauthorized
        }
        ureq::Error::Status(..) => false,
    }
}

fn map_ureq_error(err: ureq::Error, safe_url: &str) -> TransportError {
    match err {
        ureq::Error::Status(404, _) | ureq::Error::Status(410, _) => TransportError::NotFound {
            url: safe_url.to_string(),
        },
        ureq::Error::Status(status, _) => TransportError::Status {
            status,
            url: safe_url.to_string(),
        },
        ureq::Error::Transport(transport) => TransportError::Connection {
            url: safe_url.to_string(),
            message: transport.to_string(),
        },
    }
}
