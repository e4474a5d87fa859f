//! Connection supervisor.
//!
//! Owns the WebSocket session to the dispatch server and drives the
//! connection state machine:
//!
//! ```text
//! Idle ──► Connecting ──► Open ──► Closed ──► Connecting ...
//!              │            │
//!              └────────────┴──► Banned (terminal)
//! ```
//!
//! One Tokio task, one event at a time: connect, send the login frame, then
//! `tokio::select!` over inbound frames and the shutdown flag. Inbound
//! frames are decoded and routed; replies are written back on the same
//! connection. Transport failures are classified - transient errors retry
//! with the two-tier backoff up to the transport ceiling, anything else
//! aborts the run. A server ban halts the machine permanently: no further
//! connection attempt is ever made.
//!
//! Reconnection is synchronous within the supervisor: the backoff wait
//! happens inline (sliced so a shutdown request cancels it) and no other
//! work proceeds meanwhile.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::backoff::BackoffPolicy;
use crate::config::Config;
use crate::constants::{
    BACKOFF_WAIT_SLICE, LOGIN_RETRY_CEILING, SHUTDOWN_CHECK_INTERVAL, TRANSPORT_RETRY_CEILING,
};
use crate::protocol::{reply, Command, Frame};
use crate::router::{self, Capabilities, Directive};
use crate::session::{ConnState, Identity, Session};

/// Concrete WebSocket stream type (avoids repeating the generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsSink = futures_util::stream::SplitSink<WsStream, tungstenite::Message>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Run the supervisor until the session ends.
///
/// Returns `Ok` on shutdown request, server ban, or an orderly server-side
/// close; returns an error when a retry ceiling is exhausted or a
/// non-transient transport failure occurs.
pub async fn run(config: &Config, caps: Capabilities, shutdown: Arc<AtomicBool>) -> Result<()> {
    let transport_policy = BackoffPolicy::new(TRANSPORT_RETRY_CEILING);
    let login_policy = BackoffPolicy::new(LOGIN_RETRY_CEILING);
    let mut session = Session::new(Identity::from_config(config));

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("[Client] shutdown requested, exiting connection loop");
            return Ok(());
        }
        // A recorded ban suppresses every future connection attempt.
        if session.banned {
            log::error!("[Client] session is banned, refusing to reconnect");
            return Ok(());
        }

        session.state = ConnState::Connecting;
        log::info!(
            "[Client] connecting to {} (attempt counter {})",
            session.identity.server_url,
            session.reconnect_attempts
        );

        let ws_stream = match tokio_tungstenite::connect_async(session.identity.server_url.as_str())
            .await
        {
            Ok((stream, _response)) => {
                log::info!("[Client] WebSocket connected");
                stream
            }
            Err(e) => {
                session.state = ConnState::Closed;
                handle_transport_error(
                    &mut session,
                    &transport_policy,
                    &shutdown,
                    &e,
                    "connect",
                )
                .await?;
                continue;
            }
        };

        session.record_open();
        let (mut sink, mut source) = ws_stream.split();

        // First frame after every open is the login announcement.
        let login_frame = reply::login(&session.identity.display_name);
        if let Err(e) = sink.send(tungstenite::Message::Text(login_frame)).await {
            session.state = ConnState::Closed;
            handle_transport_error(&mut session, &transport_policy, &shutdown, &e, "login").await?;
            continue;
        }
        log::info!("[Client] logged in as {}", session.identity.display_name);

        let exit = run_message_loop(&mut session, &caps, &mut sink, &mut source, &shutdown).await;

        match exit {
            LoopExit::Shutdown => {
                log::info!("[Client] shutdown requested, connection closed");
                return Ok(());
            }
            LoopExit::Banned => {
                // record_ban already ran in the router; the loop-top check
                // would also catch this, but there is nothing left to do.
                log::error!("[Client] banned by server, halting permanently");
                return Ok(());
            }
            LoopExit::ServerClosed => {
                // An orderly close without a preceding error does not retry.
                session.state = ConnState::Closed;
                log::info!("[Client] server closed the connection, exiting");
                return Ok(());
            }
            LoopExit::LoginRetry => {
                session.state = ConnState::Closed;
                if login_policy.exceeded(session.login_retry_attempts) {
                    bail!(
                        "login rejected {} times (ceiling {}), giving up",
                        session.login_retry_attempts,
                        login_policy.ceiling()
                    );
                }
                let delay = login_policy.delay(session.login_retry_attempts);
                log::warn!(
                    "[Client] login rejected, reconnecting in {}s (retry {}/{})",
                    delay.as_secs(),
                    session.login_retry_attempts,
                    login_policy.ceiling()
                );
                if !backoff_wait(delay, &shutdown).await {
                    return Ok(());
                }
            }
            LoopExit::Transport(e) => {
                session.state = ConnState::Closed;
                handle_transport_error(&mut session, &transport_policy, &shutdown, &e, "session")
                    .await?;
            }
            LoopExit::StreamEnded => {
                // The peer vanished without a close handshake - same as a
                // connection-reset class failure.
                session.state = ConnState::Closed;
                let reset = tungstenite::Error::ConnectionClosed;
                handle_transport_error(&mut session, &transport_policy, &shutdown, &reset, "eof")
                    .await?;
            }
        }
    }
}

/// Classify a transport failure and either arm the next reconnect or abort.
///
/// Transient errors advance the reconnect counter and wait out the backoff
/// (returning `Ok` so the caller's loop reconnects); non-transient errors
/// and an exhausted ceiling abort the run.
async fn handle_transport_error(
    session: &mut Session,
    policy: &BackoffPolicy,
    shutdown: &AtomicBool,
    error: &tungstenite::Error,
    phase: &str,
) -> Result<()> {
    if !is_transient(error) {
        bail!("non-transient transport error during {phase}: {error}");
    }

    session.reconnect_attempts += 1;
    if policy.exceeded(session.reconnect_attempts) {
        bail!(
            "transport failed {} times (ceiling {}), giving up: {error}",
            session.reconnect_attempts,
            policy.ceiling()
        );
    }

    let delay = policy.delay(session.reconnect_attempts);
    log::warn!(
        "[Client] transport error during {phase}: {error} - reconnect {} in {}s",
        session.reconnect_attempts,
        delay.as_secs()
    );
    let _ = backoff_wait(delay, shutdown).await;
    Ok(())
}

/// Result of the inner message loop.
enum LoopExit {
    /// Shutdown was requested -- exit entirely.
    Shutdown,
    /// A ban command was routed -- halt permanently.
    Banned,
    /// The server rejected our login -- reconnect on the login counter.
    LoginRetry,
    /// The server sent an orderly close frame.
    ServerClosed,
    /// The socket failed mid-session.
    Transport(tungstenite::Error),
    /// The stream ended without a close handshake.
    StreamEnded,
}

/// Inner message loop for a single connection.
///
/// Decodes each inbound text frame, routes it, writes the replies, and acts
/// on the router's directive. Returns when the connection is lost, the
/// server closes or bans, login is rejected, or shutdown is requested.
async fn run_message_loop(
    session: &mut Session,
    caps: &Capabilities,
    sink: &mut WsSink,
    source: &mut WsSource,
    shutdown: &AtomicBool,
) -> LoopExit {
    let mut shutdown_check = tokio::time::interval(SHUTDOWN_CHECK_INTERVAL);
    shutdown_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            let _ = sink.send(tungstenite::Message::Close(None)).await;
            return LoopExit::Shutdown;
        }

        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match handle_frame(&text, session, caps, sink).await {
                            Ok(Directive::Continue) => {}
                            Ok(Directive::LoginRetry) => return LoopExit::LoginRetry,
                            Ok(Directive::Banned) => return LoopExit::Banned,
                            Err(e) => return LoopExit::Transport(e),
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        let _ = sink.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                            .unwrap_or((1005, String::new()));
                        log::info!("[Client] connection closed by server (code={code}, reason={reason})");
                        return LoopExit::ServerClosed;
                    }
                    Some(Ok(_)) => {
                        // Binary/pong frames are not part of the protocol.
                    }
                    Some(Err(e)) => {
                        log::warn!("[Client] WebSocket error: {e}");
                        return LoopExit::Transport(e);
                    }
                    None => {
                        log::warn!("[Client] WebSocket stream ended");
                        return LoopExit::StreamEnded;
                    }
                }
            }

            // Wake periodically so the shutdown flag is honored while idle.
            _ = shutdown_check.tick() => {}
        }
    }
}

/// Decode one inbound text frame, route it, and write the replies.
///
/// Malformed frames are logged and dropped without effect.
///
/// # Errors
///
/// Returns the underlying transport error when a reply cannot be written.
async fn handle_frame(
    text: &str,
    session: &mut Session,
    caps: &Capabilities,
    sink: &mut WsSink,
) -> std::result::Result<Directive, tungstenite::Error> {
    let Ok(frame) = Frame::decode(text) else {
        log::warn!("[Client] command error: frame without delimiter, dropping");
        return Ok(Directive::Continue);
    };

    let command = Command::from_frame(&frame);
    log::info!("[Client] received '{}' command", frame.flag);

    let dispatch = router::dispatch(command, session, caps).await;
    for frame_out in dispatch.replies {
        sink.send(tungstenite::Message::Text(frame_out)).await?;
    }
    Ok(dispatch.directive)
}

/// Classify a transport error as transient (retry) or not (abort).
///
/// Transient: connection refused/reset/aborted, broken pipe, not-connected,
/// timeout, unexpected EOF, a peer reset without close handshake, and the
/// library's own "connection already closed" conditions. Everything else -
/// TLS failures, protocol violations, oversized frames - aborts.
fn is_transient(error: &tungstenite::Error) -> bool {
    use std::io::ErrorKind;

    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::NotConnected
                | ErrorKind::TimedOut
                | ErrorKind::UnexpectedEof
        ),
        tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        ) => true,
        _ => false,
    }
}

/// Sleep `delay` in slices, aborting early on shutdown.
///
/// Returns `false` when the wait was cut short by a shutdown request - the
/// pending reconnect is cancelled rather than attempted.
async fn backoff_wait(delay: Duration, shutdown: &AtomicBool) -> bool {
    let mut remaining = delay;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(BACKOFF_WAIT_SLICE);
        tokio::time::sleep(slice).await;
        remaining -= slice;
    }
    !shutdown.load(Ordering::SeqCst)
}
