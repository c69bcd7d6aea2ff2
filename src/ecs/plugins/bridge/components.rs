use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::SyncResult;
use crate::store::{LobbySnapshot, WriteOutcome};
use crate::sync::WriteRequest;

/// Work sent from the ECS to the store runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    Write(WriteRequest),
    /// Delete every lobby in the store.
    ClearAll,
}

/// Result of one dispatched write, sent back to the ECS.
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub request: WriteRequest,
    pub result: SyncResult<WriteOutcome>,
}

// Channels between the ECS and the store runtime thread
#[derive(Resource)]
pub struct StoreBridge {
    pub command_sender: mpsc::UnboundedSender<BridgeCommand>,
    /// Taken by the runtime thread when it starts.
    pub command_receiver: Mutex<Option<mpsc::UnboundedReceiver<BridgeCommand>>>,
    pub reports: Receiver<WriteReport>,
    pub report_sender: Sender<WriteReport>,
    pub snapshots: Receiver<LobbySnapshot>,
    pub snapshot_sender: Sender<LobbySnapshot>,
}

impl Default for StoreBridge {
    fn default() -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let (snapshot_tx, snapshot_rx) = crossbeam_channel::unbounded();
        Self {
            command_sender: command_tx,
            command_receiver: Mutex::new(Some(command_rx)),
            reports: report_rx,
            report_sender: report_tx,
            snapshots: snapshot_rx,
            snapshot_sender: snapshot_tx,
        }
    }
}

impl StoreBridge {
    pub fn send(&self, command: BridgeCommand) -> SyncResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| crate::error::SyncError::ChannelClosed)
    }
}
