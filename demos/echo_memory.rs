//! Round trip over the in-memory hub.
//!
//! A toy responder answers on `requests/echo`; the client classifies its
//! command-line arguments into typed values and sends them as the request.
//!
//! ```text
//! cargo run --example echo_memory --features logging -- 42 7L 2.5f hello
//! ```

use bytes::Bytes;
use pubsub_rpc::{
    classify_all, create_memory_transport, Envelope, MemoryHub, Result, RpcClient, RpcConfig,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    env_logger::init();

    let hub = MemoryHub::new();

    let responder = create_memory_transport("echo-responder", hub.clone());
    let mut requests = responder.subscribe("requests/echo".into(), 16).await?;

    let publisher = responder.clone();
    tokio::spawn(async move {
        while let Some(env) = requests.inbox.recv().await {
            let (Some(id), Some(reply_to)) = (env.correlation_id(), env.reply_to.clone()) else {
                continue;
            };
            let reply = Envelope::response(reply_to, Bytes::clone(&env.payload), id);
            if let Err(err) = publisher.publish(reply).await {
                eprintln!("responder publish failed: {err}");
            }
        }
    });

    let client: RpcClient<serde_json::Value> = RpcClient::with_transport(
        create_memory_transport("echo-client", hub.clone()),
        RpcConfig::new("responses/echo-client").with_request_timeout(Duration::from_secs(2)),
    )
    .await?;

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    let args = classify_all(&tokens)?;

    for value in &args {
        println!("{value}\t{}", value.kind());
    }

    let reply = client.request("requests/echo", &args).await?;
    println!("reply: {reply}");

    client.shutdown();
    responder.close().await?;
    Ok(())
}
