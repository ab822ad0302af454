use std::fmt;
use std::sync::Arc;

use quarry_core::ProgressConsumer;

use crate::error::{Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEventKind {
    Initiated,
    Started,
    Progressed,
    Succeeded,
    Failed,
}

impl TransferEventKind {
    /// Events at which a pending cancellation aborts the transfer.
    #[must_use]
    pub fn is_cancellation_checkpoint(self) -> bool {
        matches!(self, Self::Initiated | Self::Started | Self::Progressed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub kind: TransferEventKind,
    /// Sanitized resource url.
    pub url: String,
    pub transferred: u64,
    pub content_length: Option<u64>,
    pub error: Option<String>,
}

impl TransferEvent {
    pub fn new(kind: TransferEventKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            transferred: 0,
            content_length: None,
            error: None,
        }
    }
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransferEventKind::Initiated => write!(f, "Downloading {}", self.url),
            TransferEventKind::Started => write!(f, "Started downloading {}", self.url),
            TransferEventKind::Progressed => match self.content_length {
                Some(total) => write!(
                    f,
                    "Downloaded {} of {total} bytes from {}",
                    self.transferred, self.url
                ),
                None => write!(f, "Downloaded {} bytes from {}", self.transferred, self.url),
            },
            TransferEventKind::Succeeded => {
                write!(f, "Downloaded {} ({} bytes)", self.url, self.transferred)
            }
            TransferEventKind::Failed => write!(
                f,
                "Failed to download {}: {}",
                self.url,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Observer of transfer lifecycle events. Returning an error aborts the transfer.
pub trait TransferListener: Send + Sync {
    fn on_event(&self, event: &TransferEvent) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransferListener;

impl TransferListener for NoopTransferListener {
    fn on_event(&self, _event: &TransferEvent) -> Result<()> {
        Ok(())
    }
}

/// Forwards events to a [`ProgressConsumer`] as text and honours its cancellation flag.
#[derive(Clone)]
pub struct ProgressTransferListener {
    consumer: Arc<dyn ProgressConsumer>,
}

impl ProgressTransferListener {
    pub fn new(consumer: Arc<dyn ProgressConsumer>) -> Self {
        Self { consumer }
    }
}

impl TransferListener for ProgressTransferListener {
    fn on_event(&self, event: &TransferEvent) -> Result<()> {
        if event.kind.is_cancellation_checkpoint() && self.consumer.is_canceled() {
            return Err(TransportError::Cancelled {
                url: event.url.clone(),
            });
        }
        self.consumer.consume(&event.to_string());
        Ok(())
    }
}
