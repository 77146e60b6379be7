//! # Paddle Game Server Library
//!
//! This library provides the authoritative server for a two-player paddle
//! and ball game. It owns the only copy of the game state, applies the
//! players' directional commands, advances the physics at a fixed tick and
//! streams every resulting state to both players.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server decides everything: ball movement, wall and paddle bounces,
//! goals, the score and the end of a match. Clients only draw what they
//! receive and send `UP`/`DOWN` tokens back.
//!
//! ### Session Lifecycle
//! Exactly two seats exist. The server waits for two players, tells each
//! one its seat id, counts down, plays the match and, after a short
//! cool-down, closes both connections and waits for the next pair. A
//! player whose connection fails loses the match by forfeit.
//!
//! ### State Broadcasting
//! Every countdown step and every simulation step produces one JSON line
//! sent to both players. Each line is built from a single lock scope so all
//! of its fields describe the same instant.
//!
//! ## Module Organization
//!
//! - `client_manager`: the two player slots, handshake and write halves
//! - `ingest`: one task per player turning command tokens into paddle moves
//! - `game`: the shared state aggregate and its per-tick physics
//! - `simulation`: countdown pacing and the fixed-tick loop
//! - `broadcast`: frame encoding and delivery to both players
//! - `network`: the match coordinator and the per-match shared context
//! - `config`: tunable geometry, scoring and timing
//! - `error`: connection and startup error kinds
//!
//! ## Concurrency
//!
//! Each match runs two ingestor tasks and one simulation task next to the
//! coordinator. They share one `tokio::sync::Mutex` around the game state;
//! every read-modify-write of paddles, ball, score, phase or sound event
//! happens while holding it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("127.0.0.1:8080", GameConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod ingest;
pub mod network;
pub mod simulation;
