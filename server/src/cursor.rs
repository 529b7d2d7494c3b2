use std::time::Duration;

use marble_shared::protocol::CursorMsg;

use crate::channel::ChannelHandler;
use crate::hub::{ClientInfo, HubHandle, Outbound};

/// Shared pointer positions. Inbound updates are debounced and each
/// connection only ever receives the freshest position from someone else.
pub struct CursorChannel {
    debounce: Duration,
}

impl CursorChannel {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }
}

impl ChannelHandler for CursorChannel {
    fn name(&self) -> &'static str {
        "cursor"
    }

    fn debounce(&self) -> Option<Duration> {
        Some(self.debounce)
    }

    fn on_message(&self, client: &ClientInfo, text: &str, hub: &HubHandle) {
        let mut cursor: CursorMsg = match serde_json::from_str(text) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Malformed cursor from {}: {}", client.user_token, e);
                return;
            }
        };
        cursor.user_token = client.user_token.clone();
        match serde_json::to_string(&cursor) {
            Ok(json) => hub.broadcast(Outbound::from_origin(&client.user_token, json)),
            Err(e) => tracing::error!("Failed to encode cursor: {}", e),
        }
    }

    /// Latest position from anyone but the recipient's own token.
    fn render_outbound(&self, recipient: &ClientInfo, batch: Vec<Outbound>) -> Option<String> {
        batch
            .into_iter()
            .rev()
            .find(|m| m.origin_token.as_deref() != Some(recipient.user_token.as_str()))
            .map(|m| m.payload.to_string())
    }
}
