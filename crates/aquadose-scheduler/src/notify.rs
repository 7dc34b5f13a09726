//! Delivery status notifications.
//!
//! Ring-buffer history plus best-effort dispatch. A failed dispatch is
//! logged and dropped; it never blocks scheduling.

use serde::{Deserialize, Serialize};

/// A status notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Title/summary.
    pub title: String,
    /// Body content.
    pub body: String,
    /// Priority: low, normal, high, urgent.
    pub priority: NotifyPriority,
    /// Source (which component emitted this).
    pub source: String,
    /// Timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Notification priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NotifyPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Where notifications get delivered.
#[derive(Debug, Clone)]
pub enum NotifyTarget {
    /// Generic HTTP webhook — POST with JSON body.
    Webhook {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Log line only.
    Log,
}

/// Notification recorder — keeps recent history for status surfaces.
pub struct NotifyRouter {
    /// Notification history (in-memory ring buffer, max 100).
    history: Vec<Notification>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self { history: Vec::new() }
    }

    /// Record a notification in history.
    pub fn record(&mut self, notification: Notification) {
        self.history.push(notification);
        // Ring buffer — keep last 100
        if self.history.len() > 100 {
            self.history.remove(0);
        }
    }

    /// Get notification history.
    pub fn history(&self) -> &[Notification] {
        &self.history
    }

    /// Create a notification.
    pub fn create(title: &str, body: &str, source: &str, priority: NotifyPriority) -> Notification {
        Notification {
            title: title.to_string(),
            body: body.to_string(),
            priority,
            source: source.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatch a notification to a target.
/// Returns Ok(()) on success, Err(reason) on failure.
pub async fn dispatch(notification: &Notification, target: &NotifyTarget) -> Result<(), String> {
    match target {
        NotifyTarget::Webhook { url, headers } => send_webhook(url, headers, notification).await,
        NotifyTarget::Log => {
            tracing::info!("📢 {}: {}", notification.title, notification.body);
            Ok(())
        }
    }
}

/// Send a notification via generic HTTP webhook.
async fn send_webhook(
    url: &str,
    headers: &[(String, String)],
    notification: &Notification,
) -> Result<(), String> {
    let client = reqwest::Client::new();
    let mut req = client
        .post(url)
        .json(&serde_json::json!({
            "title": notification.title,
            "body": notification.body,
            "priority": format!("{:?}", notification.priority),
            "source": notification.source,
            "timestamp": notification.timestamp.to_rfc3339(),
        }))
        .timeout(std::time::Duration::from_secs(10));

    for (key, value) in headers {
        req = req.header(key.as_str(), value.as_str());
    }

    let resp = req
        .send()
        .await
        .map_err(|e| format!("Webhook send failed: {e}"))?;

    if resp.status().is_success() {
        tracing::debug!("✅ webhook notification sent to {url}: {}", notification.title);
        Ok(())
    } else {
        let status = resp.status();
        Err(format!("Webhook error {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_a_ring_buffer() {
        let mut router = NotifyRouter::new();
        for i in 0..120 {
            router.record(NotifyRouter::create(
                &format!("n{i}"),
                "body",
                "test",
                NotifyPriority::Normal,
            ));
        }
        assert_eq!(router.history().len(), 100);
        assert_eq!(router.history()[0].title, "n20");
        assert_eq!(router.history()[99].title, "n119");
    }

    #[tokio::test]
    async fn test_log_target_always_succeeds() {
        let n = NotifyRouter::create("delivery", "0.25 mL to s1", "engine", NotifyPriority::Normal);
        assert!(dispatch(&n, &NotifyTarget::Log).await.is_ok());
    }
}
