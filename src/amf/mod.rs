mod amf0;
mod decoder;
mod encoder;
pub mod amf3;

pub use amf0::{Amf0Value, markers as amf0_markers};
pub use decoder::Amf0Decoder;
pub use encoder::Amf0Encoder;
pub use amf3::{Amf3Value, Amf3Decoder, Amf3Encoder, ExternalizableHandler, ExternalizableRegistry};
