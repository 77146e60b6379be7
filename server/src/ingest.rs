//! Per-player command ingestion
//!
//! Each seated player gets one task that reads raw command chunks from its
//! stream and applies them to that player's paddle under the state lock.
//! The task ends when the stream fails, after running the forfeit path.

use crate::error::ConnectionError;
use crate::network::MatchContext;
use log::debug;
use shared::{CommandDecoder, PlayerId};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 64;

pub fn spawn_ingestor<R>(ctx: Arc<MatchContext>, id: PlayerId, reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let err = run_ingestor(&ctx, id, reader).await;
        ctx.handle_disconnect(id, &err).await;
    })
}

/// Reads commands until the stream fails and returns the failure.
pub async fn run_ingestor<R>(ctx: &MatchContext, id: PlayerId, mut reader: R) -> ConnectionError
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut decoder = CommandDecoder::new();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return ConnectionError::Closed,
            Ok(n) => n,
            Err(e) => return ConnectionError::Io(e),
        };

        let decoded = decoder.push(&buf[..n]);
        let mut state = ctx.state.lock().await;
        for command in decoded {
            match command {
                Ok(command) => {
                    state.apply_command(id, command);
                }
                Err(e) => debug!("Player {}: {}", id, e),
            }
        }
    }
}

/// Watches a seated player while the match has not started yet.
///
/// Anything the player sends before the countdown is discarded. Returns
/// once the stream ends or fails. Cancel-safe, so it can race the accept
/// of the other seat.
pub async fn watch_until_closed<R>(reader: &mut R) -> ConnectionError
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return ConnectionError::Closed,
            Ok(n) => debug!("Discarding {} bytes sent before the match", n),
            Err(e) => return ConnectionError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::MatchPhase;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::AsyncWriteExt;

    async fn live_context() -> Arc<MatchContext> {
        let ctx = Arc::new(MatchContext::new(GameConfig::default()));
        ctx.state
            .lock()
            .await
            .reset_match(&mut StdRng::seed_from_u64(1));
        ctx
    }

    #[tokio::test]
    async fn test_commands_move_only_own_paddle() {
        let ctx = live_context().await;
        let (mut client, server) = tokio::io::duplex(64);

        let handle = spawn_ingestor(Arc::clone(&ctx), 1, server);
        for token in ["DOWN ", "DOWN ", "LEFT ", "DOWN "] {
            client.write_all(token.as_bytes()).await.unwrap();
        }
        drop(client);
        handle.await.unwrap();

        let state = ctx.state.lock().await;
        assert_eq!(state.paddles, [250, 280]);
    }

    #[tokio::test]
    async fn test_token_split_across_reads_is_applied() {
        let ctx = live_context().await;
        let (mut client, server) = tokio::io::duplex(64);

        let handle = spawn_ingestor(Arc::clone(&ctx), 0, server);
        client.write_all(b"DO").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"WN").await.unwrap();
        drop(client);
        handle.await.unwrap();

        assert_eq!(ctx.state.lock().await.paddles[0], 260);
    }

    #[tokio::test]
    async fn test_watch_discards_input_until_close() {
        let (mut client, mut server) = tokio::io::duplex(64);

        client.write_all(b"UP UP").await.unwrap();
        drop(client);

        let err = watch_until_closed(&mut server).await;
        assert!(matches!(err, ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_closed_stream_forfeits() {
        let ctx = live_context().await;
        let (client, server) = tokio::io::duplex(64);

        drop(client);
        let err = run_ingestor(&ctx, 0, server).await;
        assert!(matches!(err, ConnectionError::Closed));

        ctx.handle_disconnect(0, &err).await;
        assert_eq!(ctx.state.lock().await.phase, MatchPhase::Finished(1));
        assert!(!ctx.clients.lock().await.is_connected(0));
    }

    #[tokio::test]
    async fn test_spawned_ingestor_forfeits_on_close() {
        let ctx = live_context().await;
        let (mut client, server) = tokio::io::duplex(64);

        let handle = spawn_ingestor(Arc::clone(&ctx), 1, server);
        client.write_all(b"UP").await.unwrap();
        drop(client);
        handle.await.unwrap();

        let state = ctx.state.lock().await;
        assert_eq!(state.phase, MatchPhase::Finished(0));
        assert_eq!(state.paddles[1], 240);
    }
}
