//! Server network layer: match lifecycle and shared per-match state

use crate::client_manager::{accept_player, ClientManager};
use crate::config::GameConfig;
use crate::error::{ConnectionError, ServerError};
use crate::game::GameState;
use crate::ingest::{spawn_ingestor, watch_until_closed};
use crate::simulation::run_simulation;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{PlayerId, PLAYER_IDS};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;

/// Everything the tasks of one match share.
///
/// `state` is the single lock over paddles, ball, score, phase and sound
/// event. When both locks are needed, `state` is always taken first.
pub struct MatchContext {
    pub config: GameConfig,
    pub state: Mutex<GameState>,
    pub clients: Mutex<ClientManager>,
    /// Signalled when a forfeit ends the match outside the simulation task
    pub match_over: Notify,
}

impl MatchContext {
    pub fn new(config: GameConfig) -> Self {
        Self {
            state: Mutex::new(GameState::new(config.clone())),
            clients: Mutex::new(ClientManager::new()),
            match_over: Notify::new(),
            config,
        }
    }

    /// Forfeit path for a player whose stream failed.
    ///
    /// Under the state lock the match is awarded to the opponent (if still
    /// undecided) and the slot is marked disconnected.
    pub async fn handle_disconnect(&self, id: PlayerId, err: &ConnectionError) {
        let mut state = self.state.lock().await;
        let forfeited = state.forfeit(id);
        let (addr, was_connected) = {
            let mut clients = self.clients.lock().await;
            (clients.addr(id), clients.mark_disconnected(id))
        };
        drop(state);

        if was_connected {
            match addr {
                Some(addr) => info!("Player {} ({}) connection ended: {}", id, addr, err),
                None => info!("Player {} connection ended: {}", id, err),
            }
        }
        if forfeited {
            self.match_over.notify_one();
        }
    }
}

/// Accepts pairs of players and runs their matches one after another.
pub struct Server {
    listener: TcpListener,
    config: GameConfig,
    matches_played: u64,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            config,
            matches_played: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn matches_played(&self) -> u64 {
        self.matches_played
    }

    /// Serves matches forever.
    pub async fn run(&mut self) {
        info!("Server started successfully");
        loop {
            self.run_match().await;
        }
    }

    /// Runs one full cycle: seat two players, count down, play, hold the
    /// result for the cool-down and close both connections.
    ///
    /// Returns the winner.
    pub async fn run_match(&mut self) -> Option<PlayerId> {
        let ctx = Arc::new(MatchContext::new(self.config.clone()));

        let readers = self.seat_players(&ctx).await;

        ctx.state.lock().await.reset_match(&mut StdRng::from_entropy());
        self.matches_played += 1;
        info!("Match {} starting", self.matches_played);

        let ingestors: Vec<_> = PLAYER_IDS
            .into_iter()
            .zip(readers)
            .map(|(id, reader)| spawn_ingestor(Arc::clone(&ctx), id, reader))
            .collect();

        let simulation = tokio::spawn(run_simulation(Arc::clone(&ctx), StdRng::from_entropy()));
        let winner = match simulation.await {
            Ok(winner) => winner,
            Err(e) => {
                error!("Simulation task failed: {}", e);
                ctx.state.lock().await.phase.winner()
            }
        };

        let scores = ctx.state.lock().await.scores;
        match winner {
            Some(winner) => info!(
                "Match {} over: player {} wins ({} - {})",
                self.matches_played, winner, scores[0], scores[1]
            ),
            None => warn!("Match {} ended without a winner", self.matches_played),
        }

        sleep(self.config.cooldown).await;

        for handle in ingestors {
            handle.abort();
        }
        ctx.clients.lock().await.teardown().await;
        ctx.state.lock().await.set_waiting();

        winner
    }

    /// Fills both slots and returns their read halves in slot order.
    ///
    /// Player 0 is watched while the server waits for player 1. If it
    /// leaves in the meantime its slot is freed and seating starts over,
    /// so a match only begins with both players connected.
    async fn seat_players(&self, ctx: &MatchContext) -> [OwnedReadHalf; 2] {
        loop {
            let (mut first, writer, addr) = accept_player(&self.listener, 0).await;
            ctx.clients.lock().await.bind(0, writer, addr);

            tokio::select! {
                (second, writer, addr) = accept_player(&self.listener, 1) => {
                    let mut clients = ctx.clients.lock().await;
                    clients.bind(1, writer, addr);
                    if clients.all_connected() {
                        return [first, second];
                    }
                }
                err = watch_until_closed(&mut first) => {
                    ctx.handle_disconnect(0, &err).await;
                    info!("Player 0 left before the match started, seat is open again");
                }
            }
        }
    }
}
