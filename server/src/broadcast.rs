//! State broadcasting to both players

use crate::network::MatchContext;
use log::{error, warn};
use shared::StateFrame;

/// Sends `frame` to every connected player as one JSON line.
///
/// The frame must come from a single lock scope so every field describes
/// the same instant. Players whose write fails are handed to the forfeit
/// path after delivery to the others has been attempted.
pub async fn broadcast_frame(ctx: &MatchContext, frame: &StateFrame) {
    let line = match frame.to_line() {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to encode state frame: {}", e);
            return;
        }
    };

    let failures = {
        let mut clients = ctx.clients.lock().await;
        clients
            .broadcast(line.as_bytes(), ctx.config.write_timeout)
            .await
    };

    for (id, err) in failures {
        warn!("Broadcast to player {} failed: {}", id, err);
        ctx.handle_disconnect(id, &err).await;
    }
}
