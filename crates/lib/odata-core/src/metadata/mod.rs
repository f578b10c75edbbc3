//! OData `$metadata` summarization.
//!
//! Converts a CSDL document into the advisory text handed to a language model,
//! plus the static texts used around and instead of it.

pub mod summarizer;
pub mod text;

pub use summarizer::{MAX_LISTED_PROPERTIES, MetadataParseError, MetadataSummarizer};
pub use text::{DESCRIPTION_INTRO, FALLBACK_DESCRIPTION, QUERY_CAPABILITIES};
