//! Adapter layer - concrete flash implementations of the domain's port.
//!
//! - **`NorFlashAdapter`**: implements `SectorStorage` for a region of any
//!   `embedded-storage` NOR flash
//! - **`MemoryFlash`**: RAM-backed NOR flash for tests and host tools
//!   (requires `std`)

mod error;
mod nor_flash_adapter;

#[cfg(feature = "std")]
mod memory_flash;

pub use error::AdapterError;
pub use nor_flash_adapter::{
    FlashOp, NOR_FLASH_BLOCK_SIZE, NorFlashAdapter, NorFlashConfig, NorFlashError,
};

#[cfg(feature = "std")]
pub use memory_flash::{MemoryFlash, MemoryFlashError};
