/// Host callback receiving transfer progress and polled for cancellation.
pub trait ProgressConsumer: Send + Sync {
    fn consume(&self, message: &str);

    fn is_canceled(&self) -> bool {
        false
    }
}

/// A consumer that drops every message and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressConsumer for SilentProgress {
    fn consume(&self, _message: &str) {}
}
