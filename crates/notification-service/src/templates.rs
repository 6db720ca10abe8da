use alert_core::{AlertDecision, AlertMessage};
use chrono::{DateTime, Utc};

const HEADER: &str = "📈 Market trend alerts:";

pub struct AlertTemplate;

impl AlertTemplate {
    /// Render every `should_alert` decision into one message, stamped with
    /// `now`. `None` when nothing qualifies.
    pub fn render(decisions: &[AlertDecision], now: DateTime<Utc>) -> Option<AlertMessage> {
        let alerts: Vec<&AlertDecision> = decisions.iter().filter(|d| d.should_alert).collect();
        if alerts.is_empty() {
            return None;
        }

        let mut lines = Vec::with_capacity(alerts.len() + 3);
        lines.push(HEADER.to_string());
        lines.push(format!("Time: {}", now.format("%Y-%m-%d %H:%M UTC")));
        lines.push(String::new());
        for alert in &alerts {
            lines.push(format!(
                "{} {}: {}",
                alert.sentiment.marker(),
                alert.symbol,
                alert.reason
            ));
        }

        AlertMessage::new(lines.join("\n"), alerts.len())
    }

    /// Same as [`render`](Self::render), stamped with the current UTC time.
    pub fn render_now(decisions: &[AlertDecision]) -> Option<AlertMessage> {
        Self::render(decisions, Utc::now())
    }
}
