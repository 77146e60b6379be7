//! Match tuning and timing parameters
//!
//! Defaults reproduce the classic field: 800x600, ball speed 5, paddle step
//! 10, first to 10 points, 3 second countdown and a 5 second cool-down.
//! None of these values change the wire protocol.

use crate::error::ServerError;
use shared::{
    BALL_SPEED, COUNTDOWN_START, PADDLE_HEIGHT, PADDLE_MARGIN, PADDLE_MAX_Y, PADDLE_MIN_Y,
    PADDLE_SPEED, PADDLE_START_Y, WALL_TOP, WIN_SCORE, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Field width; the ball leaves play when `x < 0` or `x > width`
    pub width: i32,
    /// Bottom wall
    pub height: i32,
    /// Top wall
    pub wall_top: i32,
    pub ball_speed: i32,
    pub paddle_height: i32,
    /// Distance from each side at which a paddle face sits
    pub paddle_margin: i32,
    pub paddle_start_y: i32,
    pub paddle_min_y: i32,
    pub paddle_max_y: i32,
    /// Pixels moved per UP/DOWN command
    pub paddle_step: i32,
    pub win_score: u32,
    pub countdown: u32,
    pub tick: Duration,
    pub countdown_interval: Duration,
    pub cooldown: Duration,
    /// Upper bound on a single frame write to one player
    pub write_timeout: Duration,
    /// Most simulation steps run for one timer wake-up
    pub max_catch_up_steps: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            wall_top: WALL_TOP,
            ball_speed: BALL_SPEED,
            paddle_height: PADDLE_HEIGHT,
            paddle_margin: PADDLE_MARGIN,
            paddle_start_y: PADDLE_START_Y,
            paddle_min_y: PADDLE_MIN_Y,
            paddle_max_y: PADDLE_MAX_Y,
            paddle_step: PADDLE_SPEED,
            win_score: WIN_SCORE,
            countdown: COUNTDOWN_START,
            tick: Duration::from_millis(16),
            countdown_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(5),
            write_timeout: Duration::from_millis(250),
            max_catch_up_steps: 5,
        }
    }
}

impl GameConfig {
    /// Center of the field, where the ball is served from.
    pub fn center(&self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        let fail = |msg: &str| Err(ServerError::InvalidConfig(msg.to_string()));

        if self.width <= 0 || self.height <= 0 {
            return fail("field dimensions must be positive");
        }
        if self.wall_top < 0 || self.wall_top >= self.height {
            return fail("wall_top must lie inside the field");
        }
        if self.paddle_margin < 0 || self.paddle_margin * 2 >= self.width {
            return fail("paddle_margin must leave room between the paddles");
        }
        if self.paddle_min_y > self.paddle_max_y {
            return fail("paddle_min_y must not exceed paddle_max_y");
        }
        if !(self.paddle_min_y..=self.paddle_max_y).contains(&self.paddle_start_y) {
            return fail("paddle_start_y must lie within the paddle bounds");
        }
        if self.ball_speed <= 0 || self.paddle_step <= 0 {
            return fail("ball_speed and paddle_step must be positive");
        }
        if self.win_score == 0 {
            return fail("win_score must be at least 1");
        }
        if self.tick.is_zero() || self.max_catch_up_steps == 0 {
            return fail("tick and max_catch_up_steps must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.center(), (400, 300));
        assert_eq!(config.paddle_max_y, 500);
        assert_eq!(config.tick, Duration::from_millis(16));
    }

    #[test]
    fn test_rejects_inverted_paddle_bounds() {
        let config = GameConfig {
            paddle_min_y: 400,
            paddle_max_y: 100,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_win_score() {
        let config = GameConfig {
            win_score: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overlapping_paddles() {
        let config = GameConfig {
            paddle_margin: 400,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
