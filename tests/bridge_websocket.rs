//! End-to-end bridge tests over a real WebSocket.
//!
//! Each test binds a [`PeerServer`] on a random port and plays the WinCC OA
//! side with a `tokio-tungstenite` client.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use winccoa_mcp::mcp::DatapointTools;
use winccoa_mcp::transport::{PeerServer, ServerHandle};
use winccoa_mcp::{Bridge, Config, ConnectionId, Error, SequentialIdGenerator};

type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Helpers
// ============================================================================

async fn start() -> Result<(Arc<Bridge>, ServerHandle)> {
    let config = Config::builder()
        .request_timeout(Some(Duration::from_secs(5)))
        .build()?;
    let bridge = Arc::new(Bridge::with_id_generator(
        &config,
        SequentialIdGenerator::with_prefix("id"),
    ));

    let server = PeerServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
    let handle = server.serve(bridge.clone());

    Ok((bridge, handle))
}

/// Connects a peer and waits until the bridge has adopted it.
async fn connect_peer(bridge: &Bridge, handle: &ServerHandle) -> Result<(Peer, ConnectionId)> {
    let previous = bridge.active_connection();
    let (peer, _) = connect_async(handle.ws_url()).await?;

    let id = timeout(WAIT, async {
        loop {
            match bridge.active_connection() {
                Some(id) if Some(id) != previous => return id,
                _ => sleep(Duration::from_millis(5)).await,
            }
        }
    })
    .await
    .context("peer was not adopted")?;

    Ok((peer, id))
}

/// Reads the next request frame as `(id, message)`.
async fn next_request(peer: &mut Peer) -> Result<(String, String)> {
    loop {
        let msg = timeout(WAIT, peer.next())
            .await
            .context("no request frame")?
            .context("peer stream ended")??;

        if !msg.is_text() {
            continue;
        }

        let frame: Value = serde_json::from_str(msg.to_text()?)?;
        let id = frame["id"].as_str().context("id")?.to_string();
        let message = frame["message"].as_str().context("message")?.to_string();
        return Ok((id, message));
    }
}

async fn reply(peer: &mut Peer, id: &str, response: &str) -> Result<()> {
    let text = json!({ "id": id, "response": response }).to_string();
    peer.send(Message::text(text)).await?;
    Ok(())
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("condition not reached")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn round_trip_over_websocket() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut peer, _) = connect_peer(&bridge, &handle).await?;

    let caller = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call("ping1").await }
    });

    let (id, message) = next_request(&mut peer).await?;
    assert_eq!(id, "id-1");
    assert_eq!(message, "ping1");

    reply(&mut peer, &id, "pong").await?;

    assert_eq!(caller.await??, "pong");
    assert_eq!(bridge.pending_count(), 0);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_calls_answered_out_of_order() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut peer, _) = connect_peer(&bridge, &handle).await?;

    let callers: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|payload| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move { (payload, bridge.call(payload).await) })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..3 {
        requests.push(next_request(&mut peer).await?);
    }

    // Answer in reverse, echoing each payload upper-cased
    for (id, message) in requests.iter().rev() {
        reply(&mut peer, id, &message.to_uppercase()).await?;
    }

    for caller in callers {
        let (payload, result) = caller.await?;
        assert_eq!(result?, payload.to_uppercase());
    }

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stray_and_malformed_frames_are_ignored() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut peer, _) = connect_peer(&bridge, &handle).await?;

    let caller = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call("ping").await }
    });
    let (id, _) = next_request(&mut peer).await?;

    peer.send(Message::text("not json")).await?;
    peer.send(Message::text(r#"{"id":"id-1"}"#)).await?;
    reply(&mut peer, "id-404", "stray").await?;
    peer.send(Message::binary(
        json!({ "id": id, "response": "pong" }).to_string().into_bytes(),
    ))
    .await?;

    assert_eq!(caller.await??, "pong");
    assert!(bridge.is_connected());

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn peer_disconnect_fails_pending_calls() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut peer, _) = connect_peer(&bridge, &handle).await?;

    let caller = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call("never answered").await }
    });
    next_request(&mut peer).await?;

    peer.close(None).await?;
    drop(peer);

    match caller.await? {
        Err(Error::ConnectionLost { .. }) => {}
        other => bail!("expected ConnectionLost, got {other:?}"),
    }

    wait_until(|| !bridge.is_connected()).await?;
    assert!(matches!(bridge.call("again").await, Err(Error::NotConnected)));
    assert_eq!(bridge.pending_count(), 0);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn new_peer_supersedes_old_one() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut first, first_id) = connect_peer(&bridge, &handle).await?;

    let stranded = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call("to first").await }
    });
    let (stranded_id, _) = next_request(&mut first).await?;

    let (mut second, second_id) = connect_peer(&bridge, &handle).await?;
    assert_ne!(first_id, second_id);

    match stranded.await? {
        Err(Error::ConnectionLost { .. }) => {}
        other => bail!("expected ConnectionLost, got {other:?}"),
    }

    // A late answer on the old socket must not resolve anything
    let _ = reply(&mut first, &stranded_id, "late").await;

    let caller = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call("to second").await }
    });
    let (id, message) = next_request(&mut second).await?;
    assert_eq!(message, "to second");
    reply(&mut second, &id, "ok").await?;

    assert_eq!(caller.await??, "ok");
    assert_eq!(bridge.active_connection(), Some(second_id));

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn datapoint_tool_through_bridge() -> Result<()> {
    let (bridge, handle) = start().await?;
    let (mut peer, _) = connect_peer(&bridge, &handle).await?;

    let api_base = Config::default().api_base;
    let tools = DatapointTools::new(bridge.clone(), api_base);

    let tool = tokio::spawn(async move { tools.get_datapoint("Pump1.speed").await });

    let (id, message) = next_request(&mut peer).await?;
    let query: Value = serde_json::from_str(&message)?;
    assert_eq!(query["type"], "GET");
    assert_eq!(query["url"], "http://localhost:3000/datapoint/Pump1.speed");

    let answer = json!({ "datapoint": "Pump1.speed", "value": "12" }).to_string();
    reply(&mut peer, &id, &answer).await?;

    assert_eq!(tool.await?, "Name of the datapoint : Pump1.speed:\nValue: 12");

    handle.shutdown().await;
    Ok(())
}
