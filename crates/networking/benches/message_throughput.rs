//! # Message Throughput
//!
//! Stress-tests the protocol layer end to end: request parsing, reply
//! serialization, buffered dispatch through the connection manager, and
//! fan-out broadcasting. Prints rates against the control loop's tick
//! budget.
//!
//! ## Run
//!
//! ```bash
//! cargo bench --package cajal-networking --bench message_throughput
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cajal_networking::messages::to_packet;
use cajal_networking::{
    ConnectionHandle, ConnectionListener, ConnectionManager, MessageFactory, NetworkResult,
    NetworkSocket, NetworkSocketRef, Packet, RequestMessage,
};
use serde_json::json;

const MESSAGE_COUNT: usize = 100_000;
const CLIENT_COUNT: usize = 100;
const BROADCAST_COUNT: usize = 1_000;

// The server defaults to a 60 Hz control loop.
const TICK_RATE: f64 = 60.0;

/// Counts outbound traffic instead of writing it anywhere.
#[derive(Default)]
struct NullSocket {
    sent: AtomicUsize,
    bytes: AtomicUsize,
}

impl NetworkSocket for NullSocket {
    fn send(&self, packet: Packet) -> NetworkResult<()> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(packet.len(), Ordering::Relaxed);
        Ok(())
    }
}

/// Counts dispatched packets instead of handling them.
#[derive(Default)]
struct CountingListener {
    connects: usize,
    requests: usize,
    bytes: usize,
}

impl ConnectionListener for CountingListener {
    fn on_connect(&mut self, _handle: &ConnectionHandle) {
        self.connects += 1;
    }

    fn on_request(&mut self, _handle: &ConnectionHandle, packet: Packet) {
        self.requests += 1;
        self.bytes += packet.len();
    }
}

fn request_texts() -> Vec<String> {
    (0..MESSAGE_COUNT)
        .map(|i| {
            format!(
                concat!(
                    r#"{{"jsonrpc":"2.0","id":{},"method":"update-model","#,
                    r#""params":{{"id":4,"visible":true,"#,
                    r#""transformation":{{"translation":[{},0.0,0.0]}}}}}}"#
                ),
                i,
                i as f64 * 0.25,
            )
        })
        .collect()
}

fn rate(count: usize, elapsed: Duration) -> f64 {
    count as f64 / elapsed.as_secs_f64()
}

fn main() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║                Cajal Networking Stress Test                ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let requests = request_texts();
    let payload_bytes: usize = requests.iter().map(String::len).sum();
    println!(
        "Workload: {} requests, {:.2} MB of JSON",
        MESSAGE_COUNT,
        payload_bytes as f64 / (1024.0 * 1024.0)
    );
    println!();

    // Test 1: request parsing
    let start = Instant::now();
    let mut expecting_reply = 0usize;
    for text in &requests {
        if let Ok(message) = RequestMessage::parse(text) {
            if message.should_be_replied() {
                expecting_reply += 1;
            }
        }
    }
    let parse_time = start.elapsed();
    println!("Test 1: request parsing");
    println!(
        "   parsed {} requests in {:.2}ms ({:.0}/sec), {} expecting a reply",
        MESSAGE_COUNT,
        parse_time.as_secs_f64() * 1000.0,
        rate(MESSAGE_COUNT, parse_time),
        expecting_reply,
    );
    println!();

    // Test 2: reply serialization
    let request = RequestMessage::parse(&requests[0]).expect("canonical request must parse");
    let start = Instant::now();
    let mut reply_bytes = 0usize;
    for i in 0..MESSAGE_COUNT {
        let reply = MessageFactory::reply(&request, json!({ "frame": i }));
        if let Ok(packet) = to_packet(&reply) {
            reply_bytes += packet.len();
        }
    }
    let serialize_time = start.elapsed();
    println!("Test 2: reply serialization");
    println!(
        "   serialized {} replies in {:.2}ms ({:.0}/sec), {:.2} MB",
        MESSAGE_COUNT,
        serialize_time.as_secs_f64() * 1000.0,
        rate(MESSAGE_COUNT, serialize_time),
        reply_bytes as f64 / (1024.0 * 1024.0),
    );
    println!();

    // Test 3: buffered dispatch through the manager
    let manager = ConnectionManager::new();
    let socket = Arc::new(NullSocket::default());
    let client: NetworkSocketRef = socket.clone();
    let handle = manager.add(client);
    let mut listener = CountingListener::default();
    manager.update(&mut listener);

    let start = Instant::now();
    for text in &requests {
        manager.receive(&handle, Packet::text(text.clone()));
    }
    let buffer_time = start.elapsed();

    let start = Instant::now();
    manager.update(&mut listener);
    let drain_time = start.elapsed();

    println!("Test 3: buffered dispatch");
    println!(
        "   buffered {} packets in {:.2}ms ({:.0}/sec)",
        MESSAGE_COUNT,
        buffer_time.as_secs_f64() * 1000.0,
        rate(MESSAGE_COUNT, buffer_time),
    );
    println!(
        "   drained {} packets in {:.2}ms ({:.0}/sec) across {} connection(s)",
        listener.requests,
        drain_time.as_secs_f64() * 1000.0,
        rate(listener.requests, drain_time),
        listener.connects,
    );
    println!();

    // Test 4: broadcast fan-out
    let manager = ConnectionManager::new();
    let fanout = Arc::new(NullSocket::default());
    for _ in 0..CLIENT_COUNT {
        let client: NetworkSocketRef = fanout.clone();
        manager.add(client);
    }
    let update = MessageFactory::notification(
        "scene",
        json!({ "bounds": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] }, "models": [] }),
    );
    let packet = to_packet(&update).expect("notification must serialize");

    let start = Instant::now();
    for _ in 0..BROADCAST_COUNT {
        manager.broadcast(packet.clone());
    }
    let broadcast_time = start.elapsed();
    let deliveries = fanout.sent.load(Ordering::Relaxed);
    println!("Test 4: broadcast fan-out");
    println!(
        "   delivered {} packets to {} clients in {:.2}ms ({:.0}/sec, {:.2} MB)",
        deliveries,
        CLIENT_COUNT,
        broadcast_time.as_secs_f64() * 1000.0,
        rate(deliveries, broadcast_time),
        fanout.bytes.load(Ordering::Relaxed) as f64 / (1024.0 * 1024.0),
    );
    println!();

    // Summary against the tick budget
    let tick_budget = Duration::from_secs_f64(1.0 / TICK_RATE);
    let per_tick = rate(listener.requests, drain_time) * tick_budget.as_secs_f64();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║                          Summary                           ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!(
        "   tick budget at {:.0} Hz: {:.2}ms",
        TICK_RATE,
        tick_budget.as_secs_f64() * 1000.0
    );
    println!("   requests dispatchable per tick: {per_tick:.0}");
}
