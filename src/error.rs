use std::fmt;

/// Errors surfaced by engine construction and the driver. The playout loop
/// itself never fails; wall-clock expiry is the normal termination path.
#[derive(Debug)]
pub enum Error {
    /// Invalid construction arguments. Raised at setup, never mid-search.
    Config(String),
    /// Allocation failure while building a transposition table.
    ResourceExhausted,
    /// API misuse, e.g. `run` before `set_time_left`.
    InvalidOperation(&'static str),
    /// A collaborator failed in a way the engine cannot classify.
    Unknown(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "{msg}: please change the parameters"),
            Error::ResourceExhausted => write!(
                f,
                "allocation failed: the parameters likely request more memory than available"
            ),
            Error::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            Error::Unknown(msg) => write!(f, "unknown error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
