//! Background tasks: packet readers, auto-ping, sequence sweep (spec §5, §9)
//!
//! Mirrors the teacher's `MessageHandler::spawn`/`run` shape: each task owns
//! a clone of the shutdown broadcast receiver and a `tokio::select!` loop,
//! and `spawn_all` hands back every `JoinHandle` so the caller can await
//! them on shutdown.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use peernet_core::packet::{Command, MAX_PACKET_SIZE};
use peernet_peerlist::autoping::{self, PingAction};

use crate::backend::Backend;
use crate::dispatch::dispatch;

/// Interval the auto-ping loop and sequence sweeper both tick at (spec §5:
/// "single task, wakes every second").
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Spawn every background task for a running node, returning their handles.
pub fn spawn_all(backend: Arc<Backend>, shutdown_rx: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if backend.socket_v4.is_some() {
        handles.push(spawn_packet_reader(backend.clone(), true, shutdown_rx.subscribe()));
    }
    if backend.socket_v6.is_some() {
        handles.push(spawn_packet_reader(backend.clone(), false, shutdown_rx.subscribe()));
    }
    handles.push(spawn_autoping(backend.clone(), shutdown_rx.subscribe()));
    handles.push(spawn_sequence_sweeper(backend, shutdown_rx.subscribe()));

    handles
}

/// One bound socket's read loop: decode nothing itself, just hand raw
/// datagrams to [`dispatch`].
fn spawn_packet_reader(
    backend: Arc<Backend>,
    is_v4: bool,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(family = if is_v4 { "v4" } else { "v6" }, "packet reader started");
        let mut buf = vec![0u8; MAX_PACKET_SIZE + 128];

        loop {
            let bound = if is_v4 { backend.socket_v4.as_ref() } else { backend.socket_v6.as_ref() };
            let Some(bound) = bound else { break };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("packet reader shutting down");
                    break;
                }
                result = bound.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => {
                            if let Err(e) = dispatch(&backend, from, &buf[..len]).await {
                                warn!(error = %e, %from, "dispatch failed");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "socket recv failed");
                        }
                    }
                }
            }
        }
    })
}

/// 1Hz driver for `peernet-peerlist`'s auto-ping tick (spec §4.C, §5).
fn spawn_autoping(backend: Arc<Backend>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("auto-ping task started");
        let mut interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("auto-ping task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    run_autoping_tick(&backend).await;
                }
            }
        }
    })
}

async fn run_autoping_tick(backend: &Arc<Backend>) {
    for task in autoping::tick(&backend.peerlist) {
        match task.action {
            PingAction::SendPing => {
                let Some(peer) = backend.peerlist.lookup_by_node_id(&task.node_id) else { continue };
                let sequence = rand::random();
                if let Err(e) = backend
                    .send_raw(task.address, Command::Ping, sequence, Vec::new())
                    .await
                {
                    debug!(peer = %task.node_id, error = %e, "auto-ping send failed");
                } else {
                    peer.touch_ping_sent(&task.address);
                }
            }
            PingAction::Invalidate => {
                debug!(peer = %task.node_id, address = %task.address, "connection invalidated");
            }
            PingAction::Remove => {
                if let Some(peer) = backend.peerlist.lookup_by_node_id(&task.node_id) {
                    peer.remove_inactive(&task.address);
                    backend.peerlist.remove_if_empty(&task.node_id);
                }
            }
        }
    }
}

/// 1Hz driver for `SequenceRegistry::sweep_once` (spec §4.H). `sweep_once`
/// itself runs each expired sequence's onTerminate effect (`InformationRequest::done()`,
/// or a block-transfer channel teardown) before returning; this loop only
/// logs how many were reclaimed.
fn spawn_sequence_sweeper(backend: Arc<Backend>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("sequence sweeper started");
        let mut interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("sequence sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let expired = backend.sequences.sweep_once(std::time::Instant::now());
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "swept expired sequences");
                    }
                }
            }
        }
    })
}
