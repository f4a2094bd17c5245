/// Handshake format type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandshakeFormat {
    /// Simple handshake (format 0) - random data
    Simple,

    /// Format 1 - with digest
    Format1,

    /// Format 2 - with digest at different position
    Format2,
}