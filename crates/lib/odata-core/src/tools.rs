//! Static registry of the reporting tools.

use odata_model::ToolDefinition;
use odata_model::schema::{
    GET_DATA_QUERY_DESCRIPTION,
    GET_ODATA_METADATA_DESCRIPTION,
    TOOL_GET_DATA,
    TOOL_GET_ODATA_METADATA,
    TOOL_QUERY_PARAM,
};
use serde_json::{Value, json};

use crate::metadata::DESCRIPTION_INTRO;

/// Input schema for `GetData`: a single required `query` string.
pub fn get_data_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            TOOL_QUERY_PARAM: {
                "type": "string",
                "description": GET_DATA_QUERY_DESCRIPTION,
            }
        },
        "required": [TOOL_QUERY_PARAM],
    })
}

/// Input schema for `GetODataMetadata`: no arguments.
pub fn get_odata_metadata_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": [],
    })
}

/// Ordered list of tool definitions.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry holding `GetData` and `GetODataMetadata`.
    ///
    /// `GetData` carries the short static description here; callers that can
    /// reach the metadata service replace it with the live summary.
    #[must_use]
    pub fn with_reporting_tools() -> Self {
        let mut registry = Self::new();
        registry.register(TOOL_GET_DATA, DESCRIPTION_INTRO, get_data_input_schema());
        registry.register(
            TOOL_GET_ODATA_METADATA,
            GET_ODATA_METADATA_DESCRIPTION,
            get_odata_metadata_input_schema(),
        );
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) {
        self.tools.push(ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema,
        });
    }

    pub fn all(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}
