use futures::future::BoxFuture;
use odata_core::upstream::{UpstreamError, UpstreamResponse, UpstreamSource};
use rmcp::model::CallToolResult;

pub const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="Reporting" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="Product">
        <Key><PropertyRef Name="ProductId" /></Key>
        <Property Name="ProductId" Type="Edm.Int32" />
        <Property Name="Name" Type="Edm.String" />
      </EntityType>
      <EntityContainer Name="Container">
        <EntitySet Name="Products" EntityType="Reporting.Product" />
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

/// Serves `METADATA` and echoes query paths back; any path containing
/// `bogus` is rejected with 400.
pub struct FixedSource;

impl UpstreamSource for FixedSource {
    fn fetch_metadata(&self) -> BoxFuture<'_, Result<String, UpstreamError>> {
        Box::pin(async { Ok(METADATA.to_string()) })
    }

    fn get(&self, path_and_query: String) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>> {
        Box::pin(async move {
            if path_and_query.contains("bogus") {
                Ok(UpstreamResponse {
                    status: 400,
                    body: "invalid $filter".to_string(),
                })
            } else {
                Ok(UpstreamResponse {
                    status: 200,
                    body: path_and_query,
                })
            }
        })
    }
}

pub fn text_of(result: &CallToolResult) -> String {
    let value = serde_json::to_value(result).expect("tool result serializes");
    value["content"][0]["text"]
        .as_str()
        .expect("text content")
        .to_string()
}

pub fn is_error(result: &CallToolResult) -> bool {
    let value = serde_json::to_value(result).expect("tool result serializes");
    value["isError"].as_bool().unwrap_or(false)
}
