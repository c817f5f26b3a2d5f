use thiserror::Error;

/// Error taxonomy for the SRS client core (see spec §7).
#[derive(Error, Debug)]
pub enum SrsError {
    /// TCP half-close, mid-line EOF, or a UDP-level error that prevents further send/receive.
    #[error("connection broken")]
    ConnectionBroken,

    /// Malformed JSON, a line missing `MsgType`, or another strict-layer protocol violation.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The server reported `VERSION_MISMATCH` (MsgType 6).
    #[error("version mismatch")]
    VersionMismatch,

    /// A correlated request did not receive its reply within the allotted budget.
    #[error("timed out waiting for reply")]
    TimedOut,

    /// A voice packet's header claimed a length that did not match the buffer.
    #[error("truncated voice frame")]
    TruncatedFrame,

    /// A GUID field was not exactly 22 ASCII bytes.
    #[error("invalid guid")]
    InvalidGuid,

    /// A modulation byte did not map into the known enum domain.
    #[error("unknown modulation code: {0}")]
    UnknownModulation(u8),

    /// A radio slot index outside `0..11` was requested.
    #[error("invalid radio slot: {0}")]
    InvalidSlot(usize),
}

pub type Result<T> = std::result::Result<T, SrsError>;
