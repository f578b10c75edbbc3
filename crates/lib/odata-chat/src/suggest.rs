//! Keyword heuristic behind `POST /api/chat/process`.

use odata_model::schema::{TOOL_GET_DATA, TOOL_GET_ODATA_METADATA};

const METADATA_KEYWORDS: [&str; 5] = ["metadata", "what data", "available", "entities", "schema"];
const DATA_KEYWORDS: [&str; 6] = ["show", "get", "fetch", "query", "data", "list"];

/// Tools a message is likely asking for, metadata first.
pub fn suggest_tools(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();

    let mut suggested = Vec::new();
    if mentions_any(&lower, &METADATA_KEYWORDS) {
        suggested.push(TOOL_GET_ODATA_METADATA.to_string());
    }
    if mentions_any(&lower, &DATA_KEYWORDS) {
        suggested.push(TOOL_GET_DATA.to_string());
    }
    suggested
}

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// Canned reply describing what the suggested tools would do.
pub fn canned_response(suggested: &[String]) -> String {
    let mut response = String::from("I'll help you with your OData query. ");
    if suggested.iter().any(|tool| tool == TOOL_GET_ODATA_METADATA) {
        response.push_str(
            "I'm retrieving the available metadata to show you what data entities are available. ",
        );
    }
    if suggested.iter().any(|tool| tool == TOOL_GET_DATA) {
        response.push_str("I'm executing a query to fetch the data you're looking for. ");
    }
    if suggested.is_empty() {
        response.push_str(
            "Please ask me about the available data, or request specific information from the OData API.",
        );
    } else {
        response.push_str("Processing your request...");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_questions_suggest_metadata() {
        assert_eq!(suggest_tools("Which entities exist?"), vec!["GetODataMetadata"]);
    }

    #[test]
    fn data_requests_suggest_get_data() {
        assert_eq!(suggest_tools("Show me the top customers"), vec!["GetData"]);
    }

    #[test]
    fn metadata_keyword_also_matches_data() {
        assert_eq!(
            suggest_tools("Describe the METADATA"),
            vec!["GetODataMetadata", "GetData"]
        );
    }

    #[test]
    fn small_talk_suggests_nothing() {
        assert!(suggest_tools("hello there").is_empty());
    }

    #[test]
    fn canned_response_covers_both_tools() {
        let suggested = suggest_tools("what data is available?");
        assert_eq!(
            canned_response(&suggested),
            "I'll help you with your OData query. \
I'm retrieving the available metadata to show you what data entities are available. \
I'm executing a query to fetch the data you're looking for. Processing your request..."
        );
    }

    #[test]
    fn canned_response_without_tools_prompts_for_a_question() {
        assert_eq!(
            canned_response(&[]),
            "I'll help you with your OData query. Please ask me about the available data, or request specific information from the OData API."
        );
    }
}
