//! Integration tests for the paddle game server
//!
//! These tests run a real server on a loopback port and drive it with
//! plain TCP clients speaking the wire protocol.

use server::config::GameConfig;
use server::network::Server;
use shared::{parse_handshake, Command, FrameReader, PlayerId, StateFrame};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config() -> GameConfig {
    GameConfig {
        tick: Duration::from_millis(5),
        countdown_interval: Duration::from_millis(100),
        cooldown: Duration::from_millis(200),
        ..GameConfig::default()
    }
}

async fn start_server(config: GameConfig) -> SocketAddr {
    let mut server = assert_ok!(Server::bind("127.0.0.1:0", config).await);
    let addr = assert_ok!(server.local_addr());
    tokio::spawn(async move { server.run().await });
    addr
}

/// Minimal protocol client used by the tests.
struct TestPlayer {
    id: PlayerId,
    stream: TcpStream,
    frames: FrameReader,
}

impl TestPlayer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = assert_ok!(TcpStream::connect(addr).await);
        let mut player = Self {
            id: 0,
            stream,
            frames: FrameReader::new(),
        };

        let line = loop {
            if let Some(line) = player.frames.next_line() {
                break line;
            }
            assert!(player.fill().await, "closed before handshake");
        };
        player.id = assert_ok!(parse_handshake(&line));
        player
    }

    /// Reads more bytes into the frame buffer; false on EOF.
    async fn fill(&mut self) -> bool {
        let mut buf = [0u8; 4096];
        let n = assert_ok!(timeout(READ_TIMEOUT, self.stream.read(&mut buf))
            .await
            .expect("timed out waiting for server"));
        self.frames.push(&buf[..n]);
        n > 0
    }

    async fn next_frame(&mut self) -> StateFrame {
        loop {
            if let Some(frame) = self.frames.next_frame() {
                return assert_ok!(frame);
            }
            assert!(self.fill().await, "server closed the connection");
        }
    }

    async fn frame_matching(&mut self, pred: impl Fn(&StateFrame) -> bool) -> StateFrame {
        loop {
            let frame = self.next_frame().await;
            if pred(&frame) {
                return frame;
            }
        }
    }

    async fn send(&mut self, command: Command) {
        assert_ok!(self.stream.write_all(command.as_token().as_bytes()).await);
        sleep(Duration::from_millis(2)).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        assert_ok!(self.stream.write_all(bytes).await);
        sleep(Duration::from_millis(2)).await;
    }

    /// Drains frames until the server closes the stream.
    async fn wait_closed(&mut self) -> Vec<StateFrame> {
        let mut seen = Vec::new();
        loop {
            while let Some(frame) = self.frames.next_frame() {
                seen.push(assert_ok!(frame));
            }
            if !self.fill().await {
                return seen;
            }
        }
    }
}

async fn seat_pair(addr: SocketAddr) -> (TestPlayer, TestPlayer) {
    let p0 = TestPlayer::connect(addr).await;
    let p1 = TestPlayer::connect(addr).await;
    (p0, p1)
}

/// MATCH FLOW TESTS
mod match_flow_tests {
    use super::*;

    /// Handshake ids, countdown order and paddle control for player 0
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn countdown_then_paddle_control() {
        let addr = start_server(fast_config()).await;
        let (mut p0, mut p1) = seat_pair(addr).await;
        assert_eq!(p0.id, 0);
        assert_eq!(p1.id, 1);

        let mut countdowns = Vec::new();
        for _ in 0..4 {
            let frame = p0.next_frame().await;
            assert_eq!(frame.scores, [0, 0]);
            assert_eq!(frame.winner, None);
            countdowns.push(frame.countdown);
        }
        assert_eq!(countdowns, vec![3, 2, 1, 0]);

        let first = p1.next_frame().await;
        assert_eq!(first.countdown, 3);
        assert_eq!(first.ball, shared::BallPosition { x: 400, y: 300 });

        for _ in 0..10 {
            p0.send(Command::Up).await;
        }
        let frame = p0.frame_matching(|f| f.paddle(0) == Some(150)).await;
        assert_eq!(frame.paddle(1), Some(250));

        for _ in 0..20 {
            p0.send(Command::Up).await;
        }
        p0.frame_matching(|f| f.paddle(0) == Some(60)).await;

        for _ in 0..5 {
            p0.send(Command::Up).await;
        }
        for _ in 0..20 {
            let frame = p0.next_frame().await;
            assert_eq!(frame.paddle(0), Some(60));
        }
    }

    /// Unknown tokens neither move the paddle nor end the match
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_tokens_are_ignored() {
        let addr = start_server(fast_config()).await;
        let (mut p0, mut p1) = seat_pair(addr).await;

        p1.send_raw(b"LEFT").await;
        p1.send_raw(b"jump\n").await;
        p1.send(Command::Down).await;

        let frame = p0.frame_matching(|f| f.paddle(1) == Some(260)).await;
        assert_eq!(frame.winner, None);
        assert_eq!(frame.paddle(0), Some(250));
    }

    /// Both players see the same frame sequence, ball always on the field
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn frames_are_consistent_between_players() {
        let addr = start_server(fast_config()).await;
        let (mut p0, mut p1) = seat_pair(addr).await;

        for _ in 0..30 {
            let a = p0.next_frame().await;
            let b = p1.next_frame().await;
            assert_eq!(a, b);
            assert!((0..=800).contains(&a.ball.x));
            assert!((60..=600).contains(&a.ball.y));
        }
    }
}

/// DISCONNECT AND RECOVERY TESTS
mod recovery_tests {
    use super::*;

    /// Dropping player 1 mid-match hands the win to player 0, and the
    /// server then seats a fresh pair
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_forfeits_and_server_recovers() {
        let addr = start_server(fast_config()).await;
        let (mut p0, p1) = seat_pair(addr).await;

        let frame = p0.next_frame().await;
        assert_eq!(frame.countdown, 3);
        drop(p1);

        let finished = p0.frame_matching(|f| f.winner.is_some()).await;
        assert_eq!(finished.winner, Some(0));

        let rest = p0.wait_closed().await;
        assert!(rest.iter().all(|f| f.winner == Some(0)));

        let (mut q0, mut q1) = seat_pair(addr).await;
        assert_eq!(q0.id, 0);
        assert_eq!(q1.id, 1);

        let fresh = q0.next_frame().await;
        assert_eq!(fresh.countdown, 3);
        assert_eq!(fresh.scores, [0, 0]);
        assert_eq!(fresh.winner, None);
        assert_eq!(q1.next_frame().await, fresh);
    }

    /// A player leaving during play forfeits just the same
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_during_play_forfeits() {
        let addr = start_server(fast_config()).await;
        let (p0, mut p1) = seat_pair(addr).await;

        p1.frame_matching(|f| f.countdown == 0).await;
        drop(p0);

        let finished = p1.frame_matching(|f| f.winner.is_some()).await;
        assert_eq!(finished.winner, Some(1));
        p1.wait_closed().await;
    }

    /// Short matches run to the win threshold and report the winner
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn match_ends_at_win_score() {
        let config = GameConfig {
            win_score: 1,
            tick: Duration::from_millis(1),
            countdown: 1,
            ..fast_config()
        };
        let addr = start_server(config).await;
        let (mut p0, mut p1) = seat_pair(addr).await;

        // Park both paddles at the bottom so the ball gets past one of them
        for _ in 0..30 {
            p0.send(Command::Down).await;
            p1.send(Command::Down).await;
        }

        // Read both streams in lockstep so neither socket backs up
        let finished = loop {
            let a = p0.next_frame().await;
            let b = p1.next_frame().await;
            assert_eq!(a, b);
            if a.winner.is_some() {
                break a;
            }
        };
        let winner = finished.winner.unwrap();
        assert_eq!(finished.scores[winner as usize], 1);
        assert_eq!(finished.scores[1 - winner as usize], 0);
    }
}
