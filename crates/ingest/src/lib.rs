pub mod chunker;
pub mod document;
pub mod reader;

pub use chunker::{Chunker, PAGE_MARKER};
pub use document::{DocumentText, fingerprint};
pub use reader::{DocumentSource, FileReader, ReadError};
