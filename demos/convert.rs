//! Single conversion - submit one request and wait for the reply.
//!
//! This demo demonstrates:
//! - Building a client with one endpoint
//! - Submitting a `convert` request with a per-request timeout
//! - Draining with `wait_for_replies`
//!
//! # Running against a worker
//!
//! Start a worker pool listening on the endpoint, then:
//!
//! ```sh
//! cargo run --example convert -- tcp://127.0.0.1:50000 你好世界
//! ```
//!
//! Prints `200 - ni hao shi jie` on success, or `408 -` if no reply
//! arrives within two seconds.

use std::time::Duration;

use apc_client::Client;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| "tcp://127.0.0.1:50000".to_string());
    let text = args.next().unwrap_or_else(|| "你好世界".to_string());

    let mut client = Client::builder().endpoint(&endpoint).build()?;

    client.start_request(
        "convert",
        vec![text.into()],
        Duration::from_millis(2000),
        |status, reply| {
            println!("{status} - {}", reply.unwrap_or_default());
        },
    );

    println!("Wait for replies");
    let pending = client.wait_for_replies(Duration::from_millis(4000));
    if pending > 0 {
        println!("{pending} request(s) left unanswered");
    }

    Ok(())
}
