use std::{error::Error, fmt};

use odata_model::EntitySetSummary;
use odata_model::schema::EDM_NAMESPACE;
use roxmltree::{Document, Node};
use tracing::warn;

use super::text::{
    DESCRIPTION_INTRO,
    ENTITY_SETS_HEADING,
    FALLBACK_DESCRIPTION,
    QUERY_CAPABILITIES,
};

/// Maximum number of non-key properties listed per entity set.
pub const MAX_LISTED_PROPERTIES: usize = 10;

/// Error type for `$metadata` documents that cannot be summarized.
#[derive(Debug)]
pub struct MetadataParseError {
    message: String,
}

impl MetadataParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MetadataParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OData metadata parse error: {}", self.message)
    }
}

impl Error for MetadataParseError {}

impl From<roxmltree::Error> for MetadataParseError {
    fn from(err: roxmltree::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MetadataParseError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(err.to_string())
    }
}

/// Turns an OData CSDL `$metadata` document into a text description that a
/// language model can use to build legal queries.
pub struct MetadataSummarizer;

impl MetadataSummarizer {
    /// Summarizes a `$metadata` document, falling back to the static
    /// description when the document cannot be parsed.
    #[must_use]
    pub fn summarize(xml: &str) -> String {
        match Self::try_summarize(xml) {
            Ok(description) => description,
            Err(err) => {
                warn!("using fallback description: {err}");
                FALLBACK_DESCRIPTION.to_string()
            }
        }
    }

    /// Summarizes a `$metadata` document.
    ///
    /// # Errors
    /// Returns `MetadataParseError` if the XML is invalid or has no schema.
    pub fn try_summarize(xml: &str) -> Result<String, MetadataParseError> {
        let entity_sets = Self::parse_entity_sets(xml)?;
        Ok(Self::render_description(&entity_sets))
    }

    /// Summarizes on a blocking task so large documents stay off the executor.
    ///
    /// # Errors
    /// Returns `MetadataParseError` if parsing fails or the task panics.
    pub async fn try_summarize_async(xml: String) -> Result<String, MetadataParseError> {
        tokio::task::spawn_blocking(move || Self::try_summarize(&xml)).await?
    }

    /// Extracts entity set summaries in document order.
    ///
    /// Entity sets without a name or an entity type reference are skipped.
    /// Entity sets whose type has no definition are kept with
    /// `type_resolved == false`.
    ///
    /// # Errors
    /// Returns `MetadataParseError` if the XML is invalid or has no `edm:Schema`.
    pub fn parse_entity_sets(xml: &str) -> Result<Vec<EntitySetSummary>, MetadataParseError> {
        let doc = Document::parse(xml)?;
        let schemas: Vec<Node<'_, '_>> = doc
            .descendants()
            .filter(|node| is_edm(*node, "Schema"))
            .collect();
        if schemas.is_empty() {
            return Err(MetadataParseError::new("document has no edm:Schema element"));
        }

        // ASP.NET OData emits the container in its own schema, so look across all of them.
        let Some(container) = schemas.iter().find_map(|schema| {
            schema
                .descendants()
                .find(|node| is_edm(*node, "EntityContainer"))
        }) else {
            return Ok(Vec::new());
        };

        let mut summaries = Vec::new();
        for entity_set in container
            .descendants()
            .filter(|node| is_edm(*node, "EntitySet"))
        {
            let Some(name) = entity_set.attribute("Name").filter(|name| !name.is_empty()) else {
                continue;
            };
            let Some(type_name) = entity_set.attribute("EntityType").and_then(simple_type_name)
            else {
                continue;
            };

            let entity_type = find_entity_type(&schemas, type_name);
            summaries.push(summarize_entity_set(name, entity_type));
        }

        Ok(summaries)
    }

    /// Renders entity set summaries into the description text.
    ///
    /// Core entities come first, then views; each section is omitted when
    /// empty and keeps the input order.
    #[must_use]
    pub fn render_description(entity_sets: &[EntitySetSummary]) -> String {
        let (views, core): (Vec<&EntitySetSummary>, Vec<&EntitySetSummary>) =
            entity_sets.iter().partition(|entity_set| entity_set.is_view());

        let mut output = String::new();
        output.push_str(DESCRIPTION_INTRO);
        output.push_str("\n\n");
        output.push_str(ENTITY_SETS_HEADING);
        output.push_str("\n\n");

        append_section(&mut output, "Core Entities", &core);
        append_section(&mut output, "Views", &views);

        output.push('\n');
        output.push_str(QUERY_CAPABILITIES);
        output.push('\n');
        output
    }
}

fn is_edm(node: Node<'_, '_>, name: &str) -> bool {
    node.has_tag_name((EDM_NAMESPACE, name))
}

fn simple_type_name(qualified: &str) -> Option<&str> {
    qualified.rsplit('.').next().filter(|name| !name.is_empty())
}

fn find_entity_type<'a, 'input>(
    schemas: &[Node<'a, 'input>],
    type_name: &str,
) -> Option<Node<'a, 'input>> {
    schemas.iter().find_map(|schema| {
        schema.descendants().find(|node| {
            is_edm(*node, "EntityType") && node.attribute("Name") == Some(type_name)
        })
    })
}

fn summarize_entity_set(name: &str, entity_type: Option<Node<'_, '_>>) -> EntitySetSummary {
    let Some(entity_type) = entity_type else {
        return EntitySetSummary {
            name: name.to_string(),
            keys: Vec::new(),
            properties: Vec::new(),
            navigation: Vec::new(),
            type_resolved: false,
        };
    };

    let keys: Vec<String> = entity_type
        .descendants()
        .filter(|node| is_edm(*node, "Key"))
        .flat_map(|key| {
            key.descendants()
                .filter(|node| is_edm(*node, "PropertyRef"))
                .filter_map(|node| node.attribute("Name"))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    let properties = entity_type
        .descendants()
        .filter(|node| is_edm(*node, "Property"))
        .filter_map(|node| node.attribute("Name"))
        .filter(|property| !keys.iter().any(|key| key.as_str() == *property))
        .take(MAX_LISTED_PROPERTIES)
        .map(str::to_string)
        .collect();

    let navigation = entity_type
        .descendants()
        .filter(|node| is_edm(*node, "NavigationProperty"))
        .filter_map(|node| node.attribute("Name"))
        .map(str::to_string)
        .collect();

    EntitySetSummary {
        name: name.to_string(),
        keys,
        properties,
        navigation,
        type_resolved: true,
    }
}

fn append_section(output: &mut String, heading: &str, entity_sets: &[&EntitySetSummary]) {
    if entity_sets.is_empty() {
        return;
    }
    output.push_str(&format!("### {heading}\n\n"));
    for entity_set in entity_sets {
        append_entity_set(output, entity_set);
    }
}

fn append_entity_set(output: &mut String, entity_set: &EntitySetSummary) {
    output.push_str(&format!("**{}**\n", entity_set.name));
    if entity_set.type_resolved {
        append_list(output, "Key", &entity_set.keys);
        append_list(output, "Properties", &entity_set.properties);
        append_list(output, "Navigation", &entity_set.navigation);
    }
    output.push('\n');
}

fn append_list(output: &mut String, label: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    output.push_str(&format!("   - {label}: {}\n", values.join(", ")));
}
