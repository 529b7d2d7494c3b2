//! The game session task and the game channel feeding it.

use std::time::Duration;

use marble_shared::protocol::{ActionRejectedMsg, ActionRequest, ServerMsg};
use tokio::sync::mpsc;

use crate::channel::ChannelHandler;
use crate::engine::Action;
use crate::game::{Game, JoinOutcome};
use crate::hub::{ClientInfo, HubHandle, Outbound};
use crate::protocol::{action_from_wire, encode};

/// Commands from client connections to the game session
#[derive(Debug)]
pub enum GameCommand {
    Join { client: ClientInfo },
    Action { client: ClientInfo, action: Action },
}

/// Run the game session. Owns the game; every mutation happens here.
pub async fn run_game_session(mut cmd_rx: mpsc::Receiver<GameCommand>, hub: HubHandle, mut game: Game) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            GameCommand::Join { client } => {
                let outcome = game.add_player(&client.user_token);
                let Some(state) = encode(&ServerMsg::GameState(game.snapshot())) else {
                    continue;
                };
                match outcome {
                    JoinOutcome::Joined => {
                        tracing::info!("Player {} joined the game", client.user_token);
                        hub.broadcast(Outbound::text(state));
                    }
                    JoinOutcome::Returning => hub.send_to(client.id, Outbound::text(state)),
                    JoinOutcome::Spectating => {
                        tracing::info!("{} is spectating, game is full", client.user_token);
                        hub.send_to(client.id, Outbound::text(state));
                    }
                }
            }
            GameCommand::Action { client, action } => match game.apply_action(&action) {
                Ok(()) => {
                    tracing::info!(
                        frames = game.frames.len(),
                        "Player {} took a turn",
                        client.user_token
                    );
                    if let Some(state) = encode(&ServerMsg::GameState(game.snapshot())) {
                        hub.broadcast(Outbound::text(state));
                    }
                }
                Err(e) => {
                    tracing::info!("Action from {} rejected: {}", client.user_token, e);
                    let msg = ServerMsg::ActionRejected(ActionRejectedMsg {
                        reason: e.to_string(),
                    });
                    if let Some(json) = encode(&msg) {
                        hub.send_to(client.id, Outbound::text(json));
                    }
                }
            },
        }
    }

    tracing::info!("Game session ended");
}

/// Game channel: joins each new connection after a short delay and turns
/// inbound payloads into actions.
pub struct GameChannel {
    cmd_tx: mpsc::Sender<GameCommand>,
    join_delay: Duration,
}

impl GameChannel {
    pub fn new(cmd_tx: mpsc::Sender<GameCommand>, join_delay: Duration) -> Self {
        Self { cmd_tx, join_delay }
    }
}

impl ChannelHandler for GameChannel {
    fn name(&self) -> &'static str {
        "game"
    }

    fn on_register(&self, client: &ClientInfo, _hub: &HubHandle) {
        let cmd_tx = self.cmd_tx.clone();
        let delay = self.join_delay;
        let client = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if cmd_tx.send(GameCommand::Join { client }).await.is_err() {
                tracing::error!("Failed to send Join command");
            }
        });
    }

    fn on_message(&self, client: &ClientInfo, text: &str, _hub: &HubHandle) {
        let wire = match ActionRequest::decode(text) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!("Malformed action from {}: {}", client.user_token, e);
                return;
            }
        };
        let cmd = GameCommand::Action {
            client: client.clone(),
            action: action_from_wire(&wire, &client.user_token),
        };
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            tracing::warn!("Dropping action from {}: {}", client.user_token, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DEFAULT_MAX_SETTLE_STEPS;
    use crate::hub::spawn_hub;
    use marble_shared::config::GameConfig;
    use marble_shared::protocol::{ActionWire, GameStateMsg};
    use marble_shared::vec2::Vec2;
    use std::sync::Arc;

    struct Harness {
        hub: HubHandle,
        channel: Arc<GameChannel>,
    }

    fn harness() -> Harness {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let channel = Arc::new(GameChannel::new(cmd_tx, Duration::from_millis(1)));
        let hub = spawn_hub(channel.clone(), Duration::from_millis(1));
        let game = Game::new(GameConfig::default(), DEFAULT_MAX_SETTLE_STEPS, 3);
        tokio::spawn(run_game_session(cmd_rx, hub.clone(), game));
        Harness { hub, channel }
    }

    fn connect(h: &Harness, token: &str) -> (ClientInfo, mpsc::Receiver<Outbound>) {
        let client = ClientInfo {
            id: h.hub.next_client_id(),
            user_token: token.to_string(),
        };
        let (tx, rx) = mpsc::channel(32);
        h.hub.register(client.clone(), tx);
        h.channel.on_register(&client, &h.hub);
        (client, rx)
    }

    async fn next_msg(rx: &mut mpsc::Receiver<Outbound>) -> ServerMsg {
        let out = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        serde_json::from_str(&out.payload).unwrap()
    }

    async fn next_state(rx: &mut mpsc::Receiver<Outbound>) -> GameStateMsg {
        match next_msg(rx).await {
            ServerMsg::GameState(state) => state,
            other => panic!("Expected GameState, got {:?}", other),
        }
    }

    fn action_text(slot: i32, x: f64, y: f64) -> String {
        let wire = ActionWire {
            inventory_slot: slot,
            pos: Vec2::new(x, y),
            vel: Vec2::new(x, y),
        };
        serde_json::to_string(&ActionRequest::wrap(&wire).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn join_broadcasts_state_to_everyone() {
        let h = harness();
        let (_, mut alice) = connect(&h, "alice");
        let state = next_state(&mut alice).await;
        assert_eq!(state.turn_order, vec!["alice".to_string()]);

        let (_, mut bob) = connect(&h, "bob");
        let for_alice = next_state(&mut alice).await;
        let for_bob = next_state(&mut bob).await;
        assert_eq!(for_alice.turn_order.len(), 2);
        assert_eq!(for_bob.players.len(), 2);
    }

    #[tokio::test]
    async fn out_of_turn_action_is_rejected_privately() {
        let h = harness();
        let (_, mut alice) = connect(&h, "alice");
        next_state(&mut alice).await;
        let (bob_info, mut bob) = connect(&h, "bob");
        next_state(&mut alice).await;
        next_state(&mut bob).await;

        h.channel.on_message(&bob_info, &action_text(0, 300.0, 240.0), &h.hub);
        match next_msg(&mut bob).await {
            ServerMsg::ActionRejected(r) => assert_eq!(r.reason, "Not your turn"),
            other => panic!("Expected ActionRejected, got {:?}", other),
        }
        assert_eq!(h.hub.client_count().await, 2);
        assert!(alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn accepted_action_broadcasts_new_state() {
        let h = harness();
        let (alice_info, mut alice) = connect(&h, "alice");
        next_state(&mut alice).await;

        h.channel.on_message(&alice_info, &action_text(0, 300.0, 240.0), &h.hub);
        let state = next_state(&mut alice).await;
        assert!(state.frames.len() >= 2);
        assert_eq!(state.players["alice"].score, 40);
        assert_eq!(state.players["alice"].turns_taken, 1);
    }

    #[tokio::test]
    async fn malformed_action_is_dropped() {
        let h = harness();
        let (alice_info, mut alice) = connect(&h, "alice");
        next_state(&mut alice).await;

        h.channel.on_message(&alice_info, "not json", &h.hub);
        h.channel.on_message(&alice_info, r#"{"action":"{oops"}"#, &h.hub);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(alice.try_recv().is_err());
        assert_eq!(h.hub.client_count().await, 1);
    }

    #[tokio::test]
    async fn returning_token_gets_state_only_for_itself() {
        let h = harness();
        let (_, mut first) = connect(&h, "alice");
        next_state(&mut first).await;

        let (_, mut second) = connect(&h, "alice");
        let state = next_state(&mut second).await;
        assert_eq!(state.players.len(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(first.try_recv().is_err());
    }
}
