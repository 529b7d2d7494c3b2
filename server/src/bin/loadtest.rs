//! Load test for the marble server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the cursor channel and stream pointer positions, or
//! - Connect to the game channel and fire shots at a fixed rate
//!
//! and count what the server sends back.
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 100)
//!   --duration S     Test duration in seconds (default: 30)
//!   --rate R         Messages per second per client (default: 10)
//!   --mode MODE      cursor | game (default: cursor)
//!   --url URL        Server base URL (default: ws://127.0.0.1:3000)

use futures_util::{SinkExt, StreamExt};
use marble_shared::protocol::{ActionRequest, ActionWire, CursorMsg, ServerMsg};
use marble_shared::vec2::Vec2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Cursor,
    Game,
}

impl Mode {
    fn path(self) -> &'static str {
        match self {
            Mode::Cursor => "/ws/cursor",
            Mode::Game => "/ws/game",
        }
    }
}

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    cursors_received: AtomicU64,
    game_states_received: AtomicU64,
    rejections_received: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

fn next_rand(state: &mut u64) -> f64 {
    // Simple LCG, good enough for jitter
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    (*state >> 32) as f64 / u32::MAX as f64
}

fn outgoing(mode: Mode, rng_state: &mut u64) -> Option<String> {
    match mode {
        Mode::Cursor => {
            let msg = CursorMsg {
                user_token: String::new(),
                mouse_x: format!("{:.0}", next_rand(rng_state) * 600.0),
                mouse_y: format!("{:.0}", next_rand(rng_state) * 480.0),
            };
            serde_json::to_string(&msg).ok()
        }
        Mode::Game => {
            let pos = Vec2::new(100.0 + next_rand(rng_state) * 400.0, 400.0);
            let action = ActionWire {
                inventory_slot: 0,
                pos,
                vel: Vec2::new(pos.x, 470.0),
            };
            let req = ActionRequest::wrap(&action).ok()?;
            serde_json::to_string(&req).ok()
        }
    }
}

fn record_incoming(mode: Mode, text: &str, metrics: &Metrics) {
    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
    if mode == Mode::Cursor {
        metrics.cursors_received.fetch_add(1, Ordering::Relaxed);
        return;
    }
    // Several queued messages may share one frame
    for line in text.lines() {
        match serde_json::from_str::<ServerMsg>(line) {
            Ok(ServerMsg::GameState(_)) => {
                metrics.game_states_received.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ServerMsg::ActionRejected(_)) => {
                metrics.rejections_received.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

async fn run_client(client_id: u32, url: String, mode: Mode, rate: f64, duration: Duration, metrics: Arc<Metrics>) {
    let connect_start = Instant::now();
    let full_url = format!("{}{}?userToken=load-{:05}", url, mode.path(), client_id);

    let (mut ws, _) = match connect_async(&full_url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let send_interval = if rate > 0.0 {
        Duration::from_secs_f64(1.0 / rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut send_timer = tokio::time::interval(send_interval);
    send_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut rng_state: u64 = client_id as u64 * 12345 + 67890;

    while Instant::now() < test_end {
        tokio::select! {
            _ = send_timer.tick() => {
                let Some(json) = outgoing(mode, &mut rng_state) else {
                    continue;
                };
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => record_incoming(mode, &text, &metrics),
                    Some(Ok(Message::Close(frame))) => {
                        if client_id < 3 {
                            eprintln!("Client {} got Close: {:?}", client_id, frame);
                        }
                        break;
                    }
                    None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 100;
    let mut duration_secs: u64 = 30;
    let mut rate: f64 = 10.0;
    let mut mode = Mode::Cursor;
    let mut url = "ws://127.0.0.1:3000".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(100);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--rate" => {
                i += 1;
                rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10.0);
            }
            "--mode" => {
                i += 1;
                mode = match args.get(i).map(String::as_str) {
                    Some("game") => Mode::Game,
                    _ => Mode::Cursor,
                };
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Marble Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Rate: {}/s per client", rate);
    println!("Mode: {:?}", mode);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    println!("Spawning {} clients...", num_clients);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            run_client(client_id, url, mode, rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();
        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }
            println!(
                "[{:3}s] connected={}, sent={}, received={}, cursors={}, game_states={}, rejected={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.messages_sent.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.cursors_received.load(Ordering::Relaxed),
                metrics_clone.game_states_received.load(Ordering::Relaxed),
                metrics_clone.rejections_received.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let sent = metrics.messages_sent.load(Ordering::Relaxed);
    let received = metrics.messages_received.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages sent: {}", sent);
    println!("Total frames received: {}", received);
    println!("Cursor frames: {}", metrics.cursors_received.load(Ordering::Relaxed));
    println!("game_state messages: {}", metrics.game_states_received.load(Ordering::Relaxed));
    println!("action_rejected messages: {}", metrics.rejections_received.load(Ordering::Relaxed));
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));
    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }
    println!(
        "Frames/sec (total): {:.0}",
        received as f64 / duration_secs.max(1) as f64
    );
}
