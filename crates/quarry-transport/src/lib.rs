//! Moving bytes from remote repositories into the local repository.

mod error;
pub mod proxy;
mod redact;
mod transfer;
mod transporter;

pub use crate::error::{Result, TransportError};
pub use crate::proxy::{
    EnvProxySelector, NoProxyAuthenticator, Proxy, ProxyAdapter, ProxyAuthenticator,
    ProxyCandidate, ProxyFlavor, ProxySelector, ProxyType,
};
pub use crate::redact::sanitize_url;
pub use crate::transfer::{
    NoopTransferListener, ProgressTransferListener, TransferEvent, TransferEventKind,
    TransferListener,
};
pub use crate::transporter::{transporter_for, FileTransporter, HttpTransporter, Transporter};
