//! Per-connection socket I/O.
//!
//! One task per accepted TCP stream: WebSocket upgrade, `hello` handshake,
//! then a loop that drains the peer's FIFO outbound queue and forwards
//! inbound frames to the channel actor.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::actor::messages::{ChannelCmd, PeerMsg};
use crate::reload::message::{ChannelMessage, Role};

type Socket = WebSocketStream<TcpStream>;

/// Serve one connection until either side closes it.
pub(super) async fn serve(
    stream: TcpStream,
    addr: SocketAddr,
    cmd_tx: mpsc::UnboundedSender<ChannelCmd>,
    handshake_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            crate::debug!("channel"; "upgrade from {} failed: {}", addr, e);
            return;
        }
    };

    let hello = tokio::select! {
        hello = tokio::time::timeout(handshake_timeout, read_hello(&mut ws)) => hello,
        _ = stop.changed() => return,
    };
    let role = match hello {
        Ok(Ok(role)) => role,
        Ok(Err(reason)) => return reject(ws, addr, reason).await,
        Err(_) => return reject(ws, addr, "handshake timed out".into()).await,
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = oneshot::channel();
    let register = ChannelCmd::Register {
        role,
        addr,
        outbound: out_tx,
        reply: reply_tx,
    };
    if cmd_tx.send(register).is_err() {
        return;
    }
    let Ok(peer) = reply_rx.await else {
        return;
    };

    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            out = out_rx.recv() => match out {
                Some(PeerMsg::Send(msg)) => {
                    if let Err(e) = sink.send(Message::Text(msg.to_json())).await {
                        crate::debug!("channel"; "write to {} failed: {}", peer, e);
                        break;
                    }
                }
                Some(PeerMsg::Close(last)) => {
                    if let Some(msg) = last {
                        let _ = sink.send(Message::Text(msg.to_json())).await;
                    }
                    let _ = sink.close().await;
                    break;
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => match ChannelMessage::from_json(&text) {
                    Ok(msg) => {
                        if cmd_tx.send(ChannelCmd::Inbound { peer, msg }).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::debug!("channel"; "ignoring malformed frame from {}: {}", peer, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    crate::debug!("channel"; "read from {} failed: {}", peer, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = stop.changed() => {
                let _ = sink.close().await;
                break;
            }
        }
    }

    let _ = cmd_tx.send(ChannelCmd::Disconnect { peer });
}

/// Read the first text frame and require it to be `hello`.
async fn read_hello(ws: &mut Socket) -> Result<Role, String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return match ChannelMessage::from_json(&text) {
                    Ok(ChannelMessage::Hello { role }) => Ok(role),
                    Ok(_) => Err("expected hello".into()),
                    Err(e) => Err(format!("invalid hello: {e}")),
                };
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => return Err("closed before hello".into()),
            Some(Ok(_)) => return Err("expected text frame".into()),
            Some(Err(e)) => return Err(e.to_string()),
        }
    }
}

async fn reject(mut ws: Socket, addr: SocketAddr, reason: String) {
    crate::log!("channel"; "rejected {}: {}", addr, reason);
    let _ = ws.send(Message::Text(ChannelMessage::error(reason).to_json())).await;
    let _ = ws.close(None).await;
}
