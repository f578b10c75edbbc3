//! Static description text.
//!
//! Consumers compare these byte-for-byte, so they are kept as separate files
//! without a trailing newline and embedded verbatim.

/// First line of every generated description.
pub const DESCRIPTION_INTRO: &str =
    "An MCP tool that retrieves data from the database using OData queries.";

/// Heading that precedes the per-entity-set paragraphs.
pub const ENTITY_SETS_HEADING: &str = "## Available Entity Sets";

/// Query options, query format and filter operators accepted by the API.
pub const QUERY_CAPABILITIES: &str = include_str!("query_capabilities.md");

/// Served whenever the live `$metadata` document cannot be fetched or parsed.
pub const FALLBACK_DESCRIPTION: &str = include_str!("fallback_description.md");
