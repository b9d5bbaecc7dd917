pub mod decoder;

pub use decoder::{EventStreamDecoder, StreamEvent};
