//! Storage adapters.
//!
//! ## Available Adapters
//!
//! - **WriteBehindSessionStore** - authoritative in-memory sessions flushed to an archive
//! - **FileSessionArchive** - one JSON document per chat
//! - **FileScriptStore**, **FilePriceStore**, **FileStatsStore**, **FileOrderStore** - JSON
//!   documents on disk
//! - **InMemory*** - map-backed equivalents for tests
//!
//! ## Usage
//!
//! ```ignore
//! let archive = Arc::new(FileSessionArchive::new("./data"));
//! let sessions = Arc::new(WriteBehindSessionStore::load(archive).await?);
//! ```

mod file_document_store;
mod file_session_archive;
mod in_memory;
mod json_file;
mod write_behind;

pub use file_document_store::{FileOrderStore, FilePriceStore, FileScriptStore, FileStatsStore};
pub use file_session_archive::FileSessionArchive;
pub use in_memory::{
    InMemoryOrderStore, InMemoryPriceStore, InMemoryScriptStore, InMemorySessionArchive,
    InMemoryStatsStore,
};
pub use write_behind::{FlushReport, WriteBehindSessionStore};
