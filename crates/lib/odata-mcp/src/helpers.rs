use odata_core::relay::QueryOutcome;
use rmcp::model::{CallToolResult, Content};

/// Maps a relay outcome onto a tool result; anything but an upstream success
/// is flagged as a tool error carrying the same text.
pub fn query_result(outcome: QueryOutcome) -> CallToolResult {
    if outcome.is_success() {
        CallToolResult::success(vec![Content::text(outcome.into_text())])
    } else {
        CallToolResult::error(vec![Content::text(outcome.into_text())])
    }
}
