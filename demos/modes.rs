//! Conversion modes - several concurrent requests, one drain call.
//!
//! This demo demonstrates:
//! - Submitting multiple requests before draining
//! - Mixed argument lists (text, mode string, flags)
//! - That callbacks fire independently of submission order
//!
//! # Running against a worker
//!
//! ```sh
//! cargo run --example modes -- tcp://127.0.0.1:50000 你好世界
//! ```
//!
//! Requests the default, tone-number and first-letter renderings of the
//! same text in one round trip.

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

    for mode in ["df", "tn", "fl"] {
        client.start_request(
            "convert",
            vec![text.clone().into(), mode.into(), true.into(), true.into()],
            Duration::from_millis(2000),
            move |status, reply| {
                println!("{mode}: {status} - {}", reply.unwrap_or_default());
            },
        );
    }

    let pending = client.wait_for_replies(Duration::from_millis(4000));
    if pending > 0 {
        println!("{pending} request(s) left unanswered");
    }

    Ok(())
}
