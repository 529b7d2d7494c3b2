use marble_shared::protocol::{ChatMsg, ChatRequest, ServerMsg};

use crate::channel::ChannelHandler;
use crate::hub::{ClientInfo, HubHandle, Outbound};
use crate::player::display_name;
use crate::protocol::encode;

/// Sender name for messages generated by the server itself
pub const SERVER_SENDER: &str = "Server";

pub fn chat_message(sender: &str, message: impl Into<String>) -> Option<String> {
    encode(&ServerMsg::Chat(ChatMsg {
        sender: sender.to_string(),
        message: message.into(),
    }))
}

/// Parse an inbound chat payload. Empty messages and bad JSON yield `None`.
pub fn parse_chat(client: &ClientInfo, text: &str) -> Option<String> {
    match serde_json::from_str::<ChatRequest>(text) {
        Ok(req) if req.message.is_empty() => None,
        Ok(req) => Some(req.message),
        Err(e) => {
            tracing::warn!("Malformed chat message from {}: {}", client.user_token, e);
            None
        }
    }
}

/// Global chat. Commands are not supported here and are dropped.
pub struct ChatChannel;

impl ChannelHandler for ChatChannel {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn on_register(&self, client: &ClientInfo, hub: &HubHandle) {
        let text = format!("{} joined chat", display_name(&client.user_token));
        if let Some(json) = chat_message(SERVER_SENDER, text) {
            hub.broadcast(Outbound::text(json));
        }
    }

    fn on_unregister(&self, client: &ClientInfo, hub: &HubHandle) {
        let text = format!("{} left chat", display_name(&client.user_token));
        if let Some(json) = chat_message(SERVER_SENDER, text) {
            hub.broadcast(Outbound::text(json));
        }
    }

    fn on_message(&self, client: &ClientInfo, text: &str, hub: &HubHandle) {
        let Some(message) = parse_chat(client, text) else {
            return;
        };
        if message.starts_with('/') {
            tracing::debug!("Ignoring chat command from {}", client.user_token);
            return;
        }
        if let Some(json) = chat_message(&display_name(&client.user_token), message) {
            hub.broadcast(Outbound::from_origin(&client.user_token, json));
        }
    }
}
