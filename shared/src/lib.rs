use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const WORLD_WIDTH: i32 = 800;
pub const WORLD_HEIGHT: i32 = 600;
pub const WALL_TOP: i32 = 60;
pub const BALL_SPEED: i32 = 5;
pub const PADDLE_SPEED: i32 = 10;
pub const PADDLE_HEIGHT: i32 = 100;
pub const PADDLE_MARGIN: i32 = 40;
pub const PADDLE_START_Y: i32 = 250;
pub const PADDLE_MIN_Y: i32 = 60;
pub const PADDLE_MAX_Y: i32 = WORLD_HEIGHT - PADDLE_HEIGHT;
pub const COUNTDOWN_START: u32 = 3;
pub const WIN_SCORE: u32 = 10;

/// Slot identity handed to a player at connect time. Always 0 or 1.
pub type PlayerId = u8;

pub const PLAYER_IDS: [PlayerId; 2] = [0, 1];

/// Returns the opponent of `id`.
pub fn other_player(id: PlayerId) -> PlayerId {
    1 - id
}

/// Errors raised while decoding data that crossed the wire.
///
/// None of these are connection failures: a malformed token or frame is
/// skipped by whoever reads it and the stream stays usable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command token {0:?}")]
    UnknownCommand(String),
    #[error("malformed state frame: {0}")]
    MalformedFrame(String),
    #[error("invalid handshake {0:?}")]
    InvalidHandshake(String),
}

/// Directional command sent by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
}

impl Command {
    pub fn as_token(&self) -> &'static str {
        match self {
            Command::Up => "UP",
            Command::Down => "DOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Command::Up),
            "DOWN" => Ok(Command::Down),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Incremental decoder for a player's command stream.
///
/// Clients send one bare token per write, but TCP may coalesce several
/// writes into one read or split a token across two, so a piece such as
/// `UPUPDOWN` yields three commands and a trailing `DO` is held back until
/// the rest of the token arrives. Pieces are separated by ASCII whitespace.
/// A piece that is not made up entirely of known tokens yields a single
/// error entry.
#[derive(Debug, Default)]
pub struct CommandDecoder {
    partial: String,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` together with whatever was held back from the
    /// previous call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Command, ProtocolError>> {
        let mut text = std::mem::take(&mut self.partial);
        text.push_str(&String::from_utf8_lossy(chunk));
        let open_tail = !text.ends_with(|c: char| c.is_ascii_whitespace());

        let pieces: Vec<&str> = text.split_ascii_whitespace().collect();
        let mut out = Vec::new();

        for (i, piece) in pieces.iter().enumerate() {
            let (commands, rest) = split_concatenated(piece);
            let is_tail = open_tail && i + 1 == pieces.len();

            if rest.is_empty() || (is_tail && is_token_prefix(rest)) {
                out.extend(commands.into_iter().map(Ok));
                if !rest.is_empty() {
                    self.partial = rest.to_string();
                }
            } else {
                out.push(Err(ProtocolError::UnknownCommand(piece.to_string())));
            }
        }

        out
    }
}

/// Splits leading tokens off `piece`, returning them and the unmatched rest.
fn split_concatenated(mut piece: &str) -> (Vec<Command>, &str) {
    let mut commands = Vec::new();
    loop {
        if let Some(rest) = piece.strip_prefix("UP") {
            commands.push(Command::Up);
            piece = rest;
        } else if let Some(rest) = piece.strip_prefix("DOWN") {
            commands.push(Command::Down);
            piece = rest;
        } else {
            return (commands, piece);
        }
    }
}

fn is_token_prefix(rest: &str) -> bool {
    [Command::Up, Command::Down]
        .iter()
        .any(|c| c.as_token().len() > rest.len() && c.as_token().starts_with(rest))
}

/// One-shot notification of the last physical event in a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundEvent {
    WallHit,
    PlatformHit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallPosition {
    pub x: i32,
    pub y: i32,
}

/// Server to client broadcast frame.
///
/// Serialized as one JSON object per line. `paddles` is keyed by the
/// decimal player id (`"0"`, `"1"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFrame {
    pub paddles: BTreeMap<String, i32>,
    pub ball: BallPosition,
    pub scores: [u32; 2],
    pub countdown: u32,
    pub winner: Option<PlayerId>,
    pub sound_event: Option<SoundEvent>,
}

impl StateFrame {
    pub fn paddle(&self, id: PlayerId) -> Option<i32> {
        self.paddles.get(&id.to_string()).copied()
    }

    /// Encodes the frame as a newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }
}

/// First message on a fresh connection: the player's slot id.
pub fn encode_handshake(id: PlayerId) -> String {
    format!("{}\n", id)
}

pub fn parse_handshake(line: &str) -> Result<PlayerId, ProtocolError> {
    let trimmed = line.trim();
    match trimmed.parse::<PlayerId>() {
        Ok(id) if PLAYER_IDS.contains(&id) => Ok(id),
        _ => Err(ProtocolError::InvalidHandshake(trimmed.to_string())),
    }
}

/// Reassembles newline-delimited messages from a byte stream.
///
/// Bytes are pushed as they arrive; complete lines are handed out in
/// order and any trailing partial line stays buffered until the rest of
/// it shows up.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Pops and decodes the next complete state frame.
    ///
    /// Blank lines are skipped. A line that does not decode is consumed and
    /// reported so the caller can move on to the next one.
    pub fn next_frame(&mut self) -> Option<Result<StateFrame, ProtocolError>> {
        loop {
            let line = self.next_line()?;
            if line.trim().is_empty() {
                continue;
            }
            return Some(StateFrame::from_line(&line));
        }
    }
}
