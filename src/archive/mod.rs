//! ZIP container recovery primitives
//!
//! ## ZIP Format
//! - Layout: [Local Headers][Data][Central Directory][EOCD]
//! - Signatures: PK\x03\x04 (Local), PK\x01\x02 (Central), PK\x05\x06 (EOCD)
//! - The central directory is the authority when intact; local headers are
//!   the only thing left when it is not
//!
//! ## Module Structure
//! ```text
//! archive/
//! ├── mod.rs         - Re-exports
//! ├── types.rs       - ArchiveEntry, CompressionMethod
//! ├── detection.rs   - Magic signatures, container detection
//! ├── scanner.rs     - Byte-by-byte local header scan
//! ├── zip.rs         - EOCD / central directory probe
//! ├── decompress.rs  - Raw, zlib and probing inflate
//! └── rebuild.rs     - Fresh archive writer
//! ```

pub mod decompress;
pub mod detection;
pub mod rebuild;
pub mod scanner;
pub mod types;
pub mod zip;

// Re-exports for convenience
pub use decompress::{decompress, decompress_with, Inflated, ProbeLimits};
pub use detection::{detect_container, ContainerKind};
pub use rebuild::{rebuild, RebuiltArchive, SkippedEntry, EMPTY_ARCHIVE};
pub use scanner::{find_entry, index_entries, scan, scan_with_stats, ByteScanner, ScanStats};
pub use types::{ArchiveEntry, CompressionMethod};
