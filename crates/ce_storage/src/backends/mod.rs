pub mod http;
pub mod memory;

pub use http::HttpStorage;
pub use memory::MemoryStorage;
