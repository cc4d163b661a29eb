//! Host editor and clipboard implementations
//!
//! - [`MemoryDocument`] / [`MemoryClipboard`]: in-process, for replay and tests
//! - [`KeystrokeEditor`] / [`SystemClipboard`]: the real desktop, behind the
//!   `system` feature

mod memory;
#[cfg(feature = "system")]
mod keyboard;

pub use memory::{MemoryClipboard, MemoryDocument};
#[cfg(feature = "system")]
pub use keyboard::{KeystrokeEditor, SystemClipboard};
