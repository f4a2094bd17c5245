//! The fan-out core: one [`Stream`] per publish key, held in a
//! [`StreamRegistry`] that a background sweeper keeps from leaking streams
//! whose publisher vanished without a clean disconnect.

mod stream;
mod registry;

pub use stream::{Stream, StreamState};
pub use registry::StreamRegistry;
