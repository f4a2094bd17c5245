use thiserror::Error;

/// FLV-tag-level errors, folded into the crate-wide [`crate::Error`] at the
/// call site rather than threaded through as their own type.
#[derive(Debug, Error)]
pub enum FlvError {
    #[error("FLV tag too short: {0} bytes")]
    TagTooShort(usize),

    #[error("unsupported FLV tag type: {0}")]
    UnsupportedTagType(u8),

    /// Not a fault: AVC signalled end-of-sequence via packet type 2 in the
    /// enhanced/legacy video tag header.
    #[error("AVC end of sequence")]
    AvcEndOfSequence,
}

impl From<FlvError> for crate::Error {
    fn from(e: FlvError) -> Self {
        match e {
            FlvError::AvcEndOfSequence => crate::Error::AvcEndOfSequence,
            other => crate::Error::protocol(other.to_string()),
        }
    }
}
