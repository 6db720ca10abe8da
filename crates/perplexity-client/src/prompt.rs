use alert_core::Snapshot;
use serde::Serialize;

const SYSTEM_PROMPT: &str = "You are a quantitative trading assistant.";

const INSTRUCTIONS: &str = "You are an assistant for market monitoring.\n\
You receive a JSON array of tickers with current price and percent change vs previous close.\n\
Identify only the most notable short-term moves that should trigger an alert for an active trader.\n\
Return ONLY a JSON array of objects with fields: symbol, should_alert (true/false), \
reason (short one-line explanation), sentiment ('bullish'|'bearish'|'unclear').\n\
Do not wrap the array in prose or code fences.\n\
Be selective and avoid noise.";

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Chat completion request with the snapshot embedded as JSON text.
pub(crate) fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    snapshot: &Snapshot,
) -> Result<ChatRequest<'a>, serde_json::Error> {
    let data = serde_json::to_string(snapshot)?;

    Ok(ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: format!("{}\n\nData: {}", INSTRUCTIONS, data),
            },
        ],
        max_tokens,
        temperature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_core::{Quote, SnapshotEntry, Symbol};

    #[test]
    fn test_request_embeds_snapshot() {
        let quote = Quote::new(Symbol::new("AAPL").unwrap(), 110.0, 100.0).unwrap();
        let snapshot: Snapshot = SnapshotEntry::from_quote(&quote).into_iter().collect();

        let request = build_request("sonar-pro", 512, 0.2, &snapshot).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");

        let user = json["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("should_alert"));
        assert!(user.contains("\"symbol\":\"AAPL\""));
        assert!(user.contains("\"price\":110.0"));
        assert!(user.contains("\"pct_change\":10.0"));
        assert!(!user.contains("\"pct_change\":\""));
    }
}
