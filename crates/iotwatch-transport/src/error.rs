/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The broker or HTTP endpoint could not be reached.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The broker refused or failed a topic subscription.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// An HTTP request could not be completed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The operation did not complete within its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The broker link was closed.
    #[error("link closed: {0}")]
    LinkClosed(String),

    /// The configured endpoint address is unusable.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
