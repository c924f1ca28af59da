//! Socket loop for one WebSocket connection.
//!
//! Reads frames in order and hands each to the `ConnectionHandler`, so replies
//! leave in the order their requests were processed. The loop also pings the
//! client every `ping_interval`, drops it after `ping_timeout` of silence, and
//! closes it when the server shuts down.

use crate::service::{wait_for_shutdown, GatewayContext};
use crate::ws::handler::{ConnectionHandler, FrameOutcome};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type Sink = SplitSink<WebSocket, Message>;

/// Drive a connection from upgrade to close.
pub async fn run_connection(
    socket: WebSocket,
    token: Option<String>,
    peer: SocketAddr,
    ctx: GatewayContext,
    shutdown: watch::Receiver<bool>,
) {
    let metrics = Arc::clone(&ctx.metrics);
    let ping_interval = ctx.config.ping_interval;
    let ping_timeout = ctx.config.ping_timeout;

    metrics.record_connect();
    let mut handler = ConnectionHandler::new(ctx);
    let connection_id = handler.connection_id();
    info!(connection_id = %connection_id, peer = %peer, "New WebSocket connection");

    let (mut sink, mut stream) = socket.split();

    if let FrameOutcome::ReplyAndClose(frame) = handler.authenticate(token.as_deref()).await {
        if sink.send(Message::Text(frame.to_text())).await.is_ok() {
            close_with(&mut sink, close_code::NORMAL, "").await;
        }
        metrics.record_disconnect();
        info!(connection_id = %connection_id, "WebSocket connection closed");
        return;
    }

    let mut ping = time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let stopping = wait_for_shutdown(shutdown);
    tokio::pin!(stopping);

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(incoming) = incoming else {
                    debug!(connection_id = %connection_id, "Stream ended");
                    break;
                };
                last_seen = Instant::now();

                let outcome = match incoming {
                    Ok(Message::Text(text)) => handler.handle_text(&text).await,
                    Ok(Message::Binary(data)) => handler.handle_binary(data).await,
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            warn!(connection_id = %connection_id, error = %e, "Failed to send pong");
                            break;
                        }
                        continue;
                    }
                    Ok(Message::Pong(_)) => continue,
                    Ok(Message::Close(_)) => {
                        debug!(connection_id = %connection_id, "WebSocket close received");
                        break;
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                };

                match outcome {
                    FrameOutcome::Silent => {}
                    FrameOutcome::Reply(frame) => {
                        if let Err(e) = sink.send(Message::Text(frame.to_text())).await {
                            warn!(connection_id = %connection_id, error = %e, "Failed to send response");
                            break;
                        }
                    }
                    FrameOutcome::ReplyAndClose(frame) => {
                        if sink.send(Message::Text(frame.to_text())).await.is_ok() {
                            close_with(&mut sink, close_code::NORMAL, "").await;
                        }
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() >= ping_timeout {
                    info!(connection_id = %connection_id, "Ping timeout, closing connection");
                    close_with(&mut sink, close_code::AWAY, "ping timeout").await;
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            _ = &mut stopping => {
                debug!(connection_id = %connection_id, "Server shutting down, closing connection");
                close_with(&mut sink, close_code::AWAY, "server shutting down").await;
                break;
            }
        }
    }

    handler.close();
    metrics.record_disconnect();
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

async fn close_with(sink: &mut Sink, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send close frame");
    }
}
