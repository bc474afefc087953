use std::fmt::{Display, Formatter};

/// Crate-wide result alias, kept from the storage engine's own convention.
pub type CResult<T> = std::result::Result<T, Error>;

/// Every failure mode the engine and its collaborators can produce.
#[derive(Debug)]
pub enum Error {
    /// An operation was attempted before `init` or after `terminate`.
    NotInitialized,
    /// `init` was called on a `Server` that is already `Running`.
    AlreadyInitialized,
    /// `subscribe`/`read` referenced a key absent from the data table.
    KeyMissing(String),
    /// `unsubscribe` referenced a client not on the key's subscriber list.
    NotSubscribed,
    /// A single pair within a batched `write` could not be stored.
    WriteFailed(String),
    /// A `write`/`read`/`delete` batch exceeded `MAX_WRITE_SIZE` pairs/keys.
    BatchTooLarge(usize),
    /// `backup` could not spawn its snapshotting child.
    BackupForkFailed(String),
    /// The client-connection queue was at `MANAGING_THREADS` capacity.
    QueueFull,
    /// A request/response/notification channel could not be opened.
    ChannelOpenFailed(String),
    /// A read or write on an open channel failed.
    ChannelIOFailed(String),
    /// A job-script line did not match the grammar.
    ParseError(String),
    /// Any other I/O failure, wrapped so callers can still use `?`.
    Io(std::io::Error),
    /// Internal invariant violation; indicates a bug rather than bad input.
    Internal(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotInitialized => write!(f, "store is not initialized"),
            Error::AlreadyInitialized => write!(f, "store is already initialized"),
            Error::KeyMissing(k) => write!(f, "key missing: {}", k),
            Error::NotSubscribed => write!(f, "client is not subscribed to this key"),
            Error::WriteFailed(k) => write!(f, "write failed for key: {}", k),
            Error::BatchTooLarge(n) => write!(f, "batch of {} pairs exceeds MAX_WRITE_SIZE", n),
            Error::BackupForkFailed(msg) => write!(f, "backup fork failed: {}", msg),
            Error::QueueFull => write!(f, "client connection queue is full"),
            Error::ChannelOpenFailed(path) => write!(f, "failed to open channel: {}", path),
            Error::ChannelIOFailed(msg) => write!(f, "channel I/O failed: {}", msg),
            Error::ParseError(line) => write!(f, "invalid command: {}", line),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
