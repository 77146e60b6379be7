//! Player slot registry for the two seats of a match
//!
//! This module owns the server side of each player's connection:
//! - Accepting a TCP peer and sending it its slot id as the handshake
//! - Holding the write half of each connection for broadcasts
//! - Tracking which slots are still connected
//! - Closing every connection when a match is torn down
//!
//! The read half of each connection is handed to that player's command
//! ingestor and never stored here.

use crate::error::ConnectionError;
use log::{debug, info, warn};
use shared::{encode_handshake, PlayerId, PLAYER_IDS};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

/// One of the two seats in a match.
#[derive(Debug)]
pub struct PlayerSlot {
    /// Fixed identity, 0 or 1
    pub id: PlayerId,
    /// Peer address of the seated player
    pub addr: Option<SocketAddr>,
    /// Outgoing half of the player's stream, owned by this slot only
    writer: Option<OwnedWriteHalf>,
    pub connected: bool,
}

impl PlayerSlot {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            addr: None,
            writer: None,
            connected: false,
        }
    }

    /// Writes `bytes` to the player, giving up after `limit`.
    async fn send(&mut self, bytes: &[u8], limit: Duration) -> Result<(), ConnectionError> {
        let writer = self.writer.as_mut().ok_or(ConnectionError::NotConnected)?;
        match timeout(limit, writer.write_all(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_) => Err(ConnectionError::Timeout(limit)),
        }
    }
}

/// Accepts the next peer for `id` and sends it the handshake.
///
/// Failed accepts and peers that vanish before the handshake is written
/// are logged and the wait starts over; this only returns once a player
/// has been told its id.
pub async fn accept_player(
    listener: &TcpListener,
    id: PlayerId,
) -> (OwnedReadHalf, OwnedWriteHalf, SocketAddr) {
    loop {
        info!("Waiting for player {}...", id);
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let (reader, mut writer) = stream.into_split();
        if let Err(e) = writer.write_all(encode_handshake(id).as_bytes()).await {
            warn!("Handshake to {} failed: {}", addr, e);
            continue;
        }

        info!("Player {} joined from {}", id, addr);
        return (reader, writer, addr);
    }
}

/// Registry of both player slots.
#[derive(Debug)]
pub struct ClientManager {
    slots: [PlayerSlot; 2],
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            slots: PLAYER_IDS.map(PlayerSlot::new),
        }
    }

    /// Seats a freshly accepted connection in slot `id`.
    ///
    /// A slot never holds two connections: anything still seated there is
    /// dropped first.
    pub fn bind(&mut self, id: PlayerId, writer: OwnedWriteHalf, addr: SocketAddr) {
        let slot = &mut self.slots[id as usize];
        if slot.writer.is_some() {
            warn!("Slot {} was still occupied, replacing its connection", id);
        }
        slot.writer = Some(writer);
        slot.addr = Some(addr);
        slot.connected = true;
    }

    /// Marks a slot as gone and drops its write half.
    ///
    /// Returns true only for the call that changed the slot.
    pub fn mark_disconnected(&mut self, id: PlayerId) -> bool {
        let slot = &mut self.slots[id as usize];
        slot.writer = None;
        if slot.connected {
            slot.connected = false;
            debug!("Slot {} marked disconnected", id);
            true
        } else {
            false
        }
    }

    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.slots[id as usize].connected
    }

    pub fn all_connected(&self) -> bool {
        self.slots.iter().all(|slot| slot.connected)
    }

    pub fn addr(&self, id: PlayerId) -> Option<SocketAddr> {
        self.slots[id as usize].addr
    }

    /// Sends `bytes` to every connected slot.
    ///
    /// Each write is bounded by `limit` and a failure on one slot does not
    /// stop delivery to the other. Failed slots are returned so the caller
    /// can run the forfeit path.
    pub async fn broadcast(
        &mut self,
        bytes: &[u8],
        limit: Duration,
    ) -> Vec<(PlayerId, ConnectionError)> {
        let mut failures = Vec::new();
        for slot in self.slots.iter_mut().filter(|slot| slot.connected) {
            if let Err(e) = slot.send(bytes, limit).await {
                failures.push((slot.id, e));
            }
        }
        failures
    }

    /// Closes every connection and empties both slots.
    pub async fn teardown(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(mut writer) = slot.writer.take() {
                if let Err(e) = writer.shutdown().await {
                    debug!("Shutdown of slot {} failed: {}", slot.id, e);
                }
            }
            slot.connected = false;
            slot.addr = None;
        }
        info!("All player slots closed");
    }
}
