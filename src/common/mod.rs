// Common utilities shared across the archive readers

pub mod binary;

pub use binary::{read_bytes_at, read_u16_at, read_u32_at};
