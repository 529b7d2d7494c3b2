use std::time::Duration;

use crate::hub::{ClientInfo, HubHandle, Outbound};

/// Per-channel behaviour plugged into a hub and its client sessions.
///
/// Hooks run synchronously on the calling task (hub task or a pump), so
/// anything slow must be spawned.
pub trait ChannelHandler: Send + Sync + 'static {
    /// Used in logs
    fn name(&self) -> &'static str;

    /// When set (and non-zero), the inbound pump keeps only the latest text
    /// message and hands it to [`ChannelHandler::on_message`] at most once
    /// per interval.
    fn debounce(&self) -> Option<Duration> {
        None
    }

    /// Called once both pumps of a new connection have been started.
    fn on_register(&self, _client: &ClientInfo, _hub: &HubHandle) {}

    /// Called after the departure delay with the identity of the removed
    /// client. The connection itself is gone by then.
    fn on_unregister(&self, _client: &ClientInfo, _hub: &HubHandle) {}

    fn on_message(&self, client: &ClientInfo, text: &str, hub: &HubHandle);

    /// Turn everything queued for `recipient` since the last write into at
    /// most one text frame. `None` writes nothing.
    fn render_outbound(&self, _recipient: &ClientInfo, batch: Vec<Outbound>) -> Option<String> {
        if batch.is_empty() {
            return None;
        }
        let parts: Vec<&str> = batch.iter().map(|m| m.payload.as_ref()).collect();
        Some(parts.join("\n"))
    }
}
