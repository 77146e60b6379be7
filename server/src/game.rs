//! Authoritative match state and the per-tick physics that advance it
//!
//! Everything that changes during a match lives in [`GameState`]: both
//! paddles, the ball, the score, the current [`MatchPhase`] and the pending
//! sound event. The server keeps exactly one instance per match behind a
//! single lock; nothing in this module knows about sockets or timers.

use crate::config::GameConfig;
use log::{debug, info};
use rand::Rng;
use shared::{other_player, BallPosition, Command, PlayerId, SoundEvent, StateFrame, PLAYER_IDS};
use std::collections::BTreeMap;

/// Lifecycle of a single match. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Waiting,
    Countdown(u32),
    Playing,
    Finished(PlayerId),
}

impl MatchPhase {
    /// True while players are seated and the match has not been decided.
    pub fn is_live(&self) -> bool {
        matches!(self, MatchPhase::Countdown(_) | MatchPhase::Playing)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            MatchPhase::Finished(winner) => Some(*winner),
            _ => None,
        }
    }

    /// Value carried in the `countdown` field of a broadcast frame.
    pub fn countdown(&self) -> u32 {
        match self {
            MatchPhase::Countdown(n) => *n,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub x: i32,
    pub y: i32,
    pub vx: i32,
    pub vy: i32,
}

impl Ball {
    /// Ball at the center of the field moving diagonally with a random
    /// sign on each axis.
    pub fn serve<R: Rng + ?Sized>(config: &GameConfig, rng: &mut R) -> Self {
        let (x, y) = config.center();
        let mut sign = || if rng.gen_bool(0.5) { 1 } else { -1 };
        Self {
            x,
            y,
            vx: config.ball_speed * sign(),
            vy: config.ball_speed * sign(),
        }
    }
}

/// What a simulation step produced besides the new positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Player credited with a point this step
    pub goal: Option<PlayerId>,
    /// Set when this step decided the match
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub config: GameConfig,
    pub paddles: [i32; 2],
    pub ball: Ball,
    pub scores: [u32; 2],
    pub phase: MatchPhase,
    pub sound_event: Option<SoundEvent>,
    /// Simulation steps run since the match started
    pub tick: u64,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let (x, y) = config.center();
        Self {
            paddles: [config.paddle_start_y; 2],
            ball: Ball {
                x,
                y,
                vx: config.ball_speed,
                vy: config.ball_speed,
            },
            scores: [0, 0],
            phase: MatchPhase::Waiting,
            sound_event: None,
            tick: 0,
            config,
        }
    }

    /// Puts every piece back to its starting value and enters the countdown.
    pub fn reset_match<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.paddles = [self.config.paddle_start_y; 2];
        self.ball = Ball::serve(&self.config, rng);
        self.scores = [0, 0];
        self.sound_event = None;
        self.tick = 0;
        self.phase = if self.config.countdown == 0 {
            MatchPhase::Playing
        } else {
            MatchPhase::Countdown(self.config.countdown)
        };
    }

    /// Returns to `Waiting` after a match has been torn down.
    pub fn set_waiting(&mut self) {
        self.phase = MatchPhase::Waiting;
        self.sound_event = None;
    }

    /// Moves a paddle by one step, clamped to the paddle bounds.
    ///
    /// Returns true if the paddle moved. Commands outside a live match are
    /// dropped.
    pub fn apply_command(&mut self, id: PlayerId, command: Command) -> bool {
        if !self.phase.is_live() {
            return false;
        }

        let cfg = &self.config;
        let paddle = &mut self.paddles[id as usize];
        let before = *paddle;
        *paddle = match command {
            Command::Up => (*paddle - cfg.paddle_step).max(cfg.paddle_min_y),
            Command::Down => (*paddle + cfg.paddle_step).min(cfg.paddle_max_y),
        };
        *paddle != before
    }

    /// Advances the countdown by one interval.
    ///
    /// Returns the new countdown value; reaching zero starts play.
    pub fn countdown_tick(&mut self) -> Option<u32> {
        let MatchPhase::Countdown(n) = self.phase else {
            return None;
        };

        let next = n.saturating_sub(1);
        if next == 0 {
            self.phase = MatchPhase::Playing;
            info!("Countdown finished, match is live");
        } else {
            self.phase = MatchPhase::Countdown(next);
        }
        Some(next)
    }

    /// Runs one fixed simulation step. Does nothing unless playing.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.phase != MatchPhase::Playing {
            return outcome;
        }
        self.tick += 1;

        let cfg = &self.config;
        let ball = &mut self.ball;
        ball.x += ball.vx;
        ball.y += ball.vy;

        let hit_top = ball.y <= cfg.wall_top && ball.vy < 0;
        let hit_bottom = ball.y >= cfg.height && ball.vy > 0;
        if hit_top || hit_bottom {
            ball.vy = -ball.vy;
            ball.y = ball.y.clamp(cfg.wall_top, cfg.height);
            self.sound_event = Some(SoundEvent::WallHit);
        }

        let spans = |paddle_y: i32, y: i32| (paddle_y..=paddle_y + cfg.paddle_height).contains(&y);
        let hit_left = ball.vx < 0 && ball.x <= cfg.paddle_margin && spans(self.paddles[0], ball.y);
        let hit_right = ball.vx > 0
            && ball.x >= cfg.width - cfg.paddle_margin
            && spans(self.paddles[1], ball.y);
        if hit_left || hit_right {
            ball.vx = -ball.vx;
            self.sound_event = Some(SoundEvent::PlatformHit);
        }

        let scorer = if ball.x < 0 {
            Some(1)
        } else if ball.x > cfg.width {
            Some(0)
        } else {
            None
        };

        if let Some(scorer) = scorer {
            self.scores[scorer as usize] += 1;
            self.ball = Ball::serve(&self.config, rng);
            outcome.goal = Some(scorer);
            debug!(
                "Player {} scored ({} - {})",
                scorer, self.scores[0], self.scores[1]
            );

            if self.scores[scorer as usize] >= self.config.win_score {
                self.phase = MatchPhase::Finished(scorer);
                outcome.winner = Some(scorer);
                info!("Player {} reached {} points", scorer, self.config.win_score);
            }
        }

        outcome
    }

    /// Awards the match to the opponent of a player whose connection failed.
    ///
    /// Returns true if this call decided the match. A match that is already
    /// finished keeps its first winner.
    pub fn forfeit(&mut self, disconnected: PlayerId) -> bool {
        if !self.phase.is_live() {
            return false;
        }
        let winner = other_player(disconnected);
        self.phase = MatchPhase::Finished(winner);
        info!(
            "Player {} disconnected, player {} wins by forfeit",
            disconnected, winner
        );
        true
    }

    /// Builds the wire frame for the current instant.
    pub fn snapshot(&self) -> StateFrame {
        let paddles: BTreeMap<String, i32> = PLAYER_IDS
            .iter()
            .map(|id| (id.to_string(), self.paddles[*id as usize]))
            .collect();

        StateFrame {
            paddles,
            ball: BallPosition {
                x: self.ball.x,
                y: self.ball.y,
            },
            scores: self.scores,
            countdown: self.phase.countdown(),
            winner: self.phase.winner(),
            sound_event: self.sound_event,
        }
    }

    /// Snapshot for broadcast; the sound event is consumed by it.
    pub fn take_frame(&mut self) -> StateFrame {
        let frame = self.snapshot();
        self.sound_event = None;
        frame
    }
}
