use std::time::Duration;

use thiserror::Error;

/// Live client errors
///
/// Individual connect attempts never surface here; they are absorbed by the
/// retry loop. Only cancellation or an expired deadline makes
/// `connect_and_join` fail.
#[derive(Debug, Error)]
pub enum Error {
    /// Connect was abandoned because the shutdown token fired
    #[error("Connect cancelled by shutdown")]
    Cancelled,

    /// Connect deadline elapsed before any attempt succeeded
    #[error("Connect deadline elapsed after {0:?}")]
    ConnectTimeout(Duration),
}
