//! Countdown and fixed-tick simulation loop for one match

use crate::broadcast::broadcast_frame;
use crate::game::MatchPhase;
use crate::network::MatchContext;
use log::{debug, info, warn};
use rand::Rng;
use shared::PlayerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// Converts elapsed wall-clock time into a whole number of fixed steps.
///
/// Leftover time carries into the next call so late wake-ups are made up
/// for instead of slowing the game down. At most `max_steps` are handed out
/// per call; anything beyond that is dropped.
#[derive(Debug)]
pub struct TickAccumulator {
    step: Duration,
    max_steps: u32,
    accumulated: Duration,
    last: Instant,
}

impl TickAccumulator {
    pub fn new(step: Duration, max_steps: u32, now: Instant) -> Self {
        Self {
            step,
            max_steps,
            accumulated: Duration::ZERO,
            last: now,
        }
    }

    /// Number of steps due at `now`.
    pub fn advance(&mut self, now: Instant) -> u32 {
        self.accumulated += now.saturating_duration_since(self.last);
        self.last = now;

        let due = (self.accumulated.as_nanos() / self.step.as_nanos()) as u64;
        if due > self.max_steps as u64 {
            warn!(
                "Simulation fell {} steps behind, dropping {}",
                due,
                due - self.max_steps as u64
            );
            self.accumulated = Duration::ZERO;
            return self.max_steps;
        }

        self.accumulated -= self.step * due as u32;
        due as u32
    }
}

/// Drives a match from its first countdown broadcast to the end.
///
/// Returns the winner. The final frame, carrying the winner, is always
/// broadcast before returning.
pub async fn run_simulation<R>(ctx: Arc<MatchContext>, mut rng: R) -> Option<PlayerId>
where
    R: Rng + Send,
{
    let frame = ctx.state.lock().await.take_frame();
    broadcast_frame(&ctx, &frame).await;

    run_countdown(&ctx).await;
    let decided_on_score = run_play(&ctx, &mut rng).await;

    let (frame, winner) = {
        let mut state = ctx.state.lock().await;
        (state.take_frame(), state.phase.winner())
    };
    if !decided_on_score {
        broadcast_frame(&ctx, &frame).await;
    }
    winner
}

async fn run_countdown(ctx: &MatchContext) {
    loop {
        if !matches!(ctx.state.lock().await.phase, MatchPhase::Countdown(_)) {
            return;
        }

        tokio::select! {
            _ = sleep(ctx.config.countdown_interval) => {}
            _ = ctx.match_over.notified() => return,
        }

        let frame = {
            let mut state = ctx.state.lock().await;
            match state.countdown_tick() {
                Some(n) => {
                    debug!("Countdown {}", n);
                    state.take_frame()
                }
                None => return,
            }
        };
        broadcast_frame(ctx, &frame).await;
    }
}

/// Runs fixed steps while the match is playing.
///
/// Returns true if a goal decided the match; that step's frame has then
/// already gone out with the winner set.
async fn run_play<R: Rng + Send>(ctx: &MatchContext, rng: &mut R) -> bool {
    if ctx.state.lock().await.phase != MatchPhase::Playing {
        return false;
    }

    let mut ticker = interval(ctx.config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick fires immediately
    ticker.tick().await;

    let mut accumulator =
        TickAccumulator::new(ctx.config.tick, ctx.config.max_catch_up_steps, Instant::now());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = ctx.match_over.notified() => return false,
        }

        for _ in 0..accumulator.advance(Instant::now()) {
            let (frame, finished) = {
                let mut state = ctx.state.lock().await;
                if state.phase != MatchPhase::Playing {
                    return false;
                }
                let outcome = state.step(rng);
                if let Some(scorer) = outcome.goal {
                    info!(
                        "Player {} scores ({} - {})",
                        scorer, state.scores[0], state.scores[1]
                    );
                }
                (state.take_frame(), outcome.winner.is_some())
            };

            broadcast_frame(ctx, &frame).await;
            if finished {
                return true;
            }
        }
    }
}
