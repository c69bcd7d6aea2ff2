use crossbeam_channel::Sender;
use futures_util::StreamExt;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::components::*;
use crate::store::{LobbySnapshot, LobbyStore};

/// Spawn the store runtime on its own thread.
///
/// Takes the command receiver out of the bridge, so a second call is a no-op.
pub fn start_store_bridge(
    bridge: &StoreBridge,
    store: LobbyStore,
    lobby: String,
    resubscribe_delay: Duration,
) {
    let Some(commands) = bridge
        .command_receiver
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
    else {
        warn!("store bridge already started");
        return;
    };
    let report_sender = bridge.report_sender.clone();
    let snapshot_sender = bridge.snapshot_sender.clone();

    let spawned = thread::Builder::new()
        .name("store-bridge".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("store-io")
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(error) => {
                    error!(%error, "failed to build store runtime");
                    return;
                }
            };
            rt.block_on(async move {
                info!(%lobby, "🌐 store bridge running");
                tokio::spawn(forward_snapshots(
                    store.clone(),
                    lobby,
                    snapshot_sender,
                    resubscribe_delay,
                ));
                dispatch_commands(store, commands, report_sender).await;
                debug!("command channel closed, store bridge stopping");
            });
        });

    if let Err(error) = spawned {
        error!(%error, "failed to spawn store bridge thread");
    }
}

/// Run every command as its own task until the channel closes.
///
/// Writes are fire-and-forget: nothing orders two writes that were dispatched
/// close together. Remaining tasks are drained before returning.
pub async fn dispatch_commands(
    store: LobbyStore,
    mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
    reports: Sender<WriteReport>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(command) = commands.recv().await {
        while in_flight.try_join_next().is_some() {}

        let store = store.clone();
        let reports = reports.clone();
        match command {
            BridgeCommand::Write(request) => {
                in_flight.spawn(async move {
                    let result = store.write(&request.lobby, &request.coordinate).await;
                    let _ = reports.send(WriteReport { request, result });
                });
            }
            BridgeCommand::ClearAll => {
                in_flight.spawn(async move {
                    if let Err(error) = store.clear_all().await {
                        warn!(%error, "clearing lobbies failed");
                    }
                });
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
}

/// Forward every snapshot of `lobby` to the ECS, re-subscribing when the
/// stream ends. Returns once the ECS side is gone.
pub async fn forward_snapshots(
    store: LobbyStore,
    lobby: String,
    sender: Sender<LobbySnapshot>,
    resubscribe_delay: Duration,
) {
    loop {
        match store.subscribe(&lobby).await {
            Ok(mut stream) => {
                while let Some(entries) = stream.next().await {
                    let snapshot = LobbySnapshot {
                        lobby: lobby.clone(),
                        entries,
                    };
                    if sender.send(snapshot).is_err() {
                        return;
                    }
                }
                warn!(%lobby, "snapshot stream ended, re-subscribing");
            }
            Err(error) => warn!(%lobby, %error, "subscribe failed"),
        }
        tokio::time::sleep(resubscribe_delay).await;
    }
}
