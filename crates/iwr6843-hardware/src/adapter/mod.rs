//! Concrete port adapters.

mod memory;
mod reader;
mod spi;

pub use memory::{MemoryCommandPort, MemoryLine, MemoryTransport};
pub use reader::ReaderTransport;
pub use spi::SpiTransport;
