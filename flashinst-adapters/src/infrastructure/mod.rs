//! Infrastructure layer - byte streams built on the sector port.

#[cfg(feature = "std")]
pub mod flash_stream;

#[cfg(feature = "std")]
pub use flash_stream::{FlashStream, StreamError};
