use thiserror::Error;

/// Channel operation errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Channel has been disposed or the connection is gone
    #[error("Channel closed")]
    Closed,

    /// Transport-level connect failure
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Send failure on a live connection
    #[error("Send failed: {0}")]
    Send(String),

    /// Post-connect handshake failure
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Other implementation-defined error
    #[error("Channel error: {0}")]
    Other(String),
}
