use alert_core::{AlertDecision, DecisionParseError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Pull the first choice's message content out of a chat completion body.
pub fn extract_content(body: &str) -> Result<String, DecisionParseError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| DecisionParseError::Envelope(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or(DecisionParseError::NoChoices)
}

/// Parse message content as a decision list.
///
/// The content must be exactly a JSON array of decision objects. One bad
/// element rejects the whole list.
pub fn parse_decisions(content: &str) -> Result<Vec<AlertDecision>, DecisionParseError> {
    Ok(serde_json::from_str(content.trim())?)
}

/// Envelope plus content in one step.
pub fn parse_response(body: &str) -> Result<Vec<AlertDecision>, DecisionParseError> {
    parse_decisions(&extract_content(body)?)
}
