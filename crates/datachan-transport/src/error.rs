/// Errors that can occur on an association endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The association has been closed; no further messages are accepted.
    #[error("association closed")]
    Closed,

    /// A delivery handler is already bound to this endpoint.
    #[error("delivery handler already bound")]
    HandlerAlreadyBound,

    /// The receiving side has no delivery handler bound yet.
    #[error("no delivery handler bound on receiving side")]
    NoHandler,

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
