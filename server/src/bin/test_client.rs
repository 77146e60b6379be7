//! Headless player for smoke-testing a running server.
//!
//! Connects, reads its seat id, then keeps its paddle centered on the ball
//! by sending `UP`/`DOWN` tokens until the match ends or time runs out.

use clap::Parser;
use log::{info, warn};
use shared::{parse_handshake, Command, FrameReader, StateFrame, PADDLE_HEIGHT};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval, sleep_until, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,
    /// Give up after this many seconds
    #[clap(short = 't', long, default_value = "60")]
    seconds: u64,
    /// Input poll interval in milliseconds
    #[clap(long, default_value = "50")]
    input_ms: u64,
}

fn choose_command(frame: &StateFrame, id: u8) -> Option<Command> {
    let paddle_center = frame.paddle(id)? + PADDLE_HEIGHT / 2;
    let dy = frame.ball.y - paddle_center;
    if dy < -PADDLE_HEIGHT / 4 {
        Some(Command::Up)
    } else if dy > PADDLE_HEIGHT / 4 {
        Some(Command::Down)
    } else {
        None
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (mut reader, mut writer) = stream.into_split();

    let mut frames = FrameReader::new();
    let mut buf = [0u8; 4096];

    let id = loop {
        if let Some(line) = frames.next_line() {
            break parse_handshake(&line)?;
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err("server closed before handshake".into());
        }
        frames.push(&buf[..n]);
    };
    info!("Seated as player {}", id);

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut input_timer = interval(Duration::from_millis(args.input_ms));
    let mut latest: Option<StateFrame> = None;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    info!("Server closed the connection");
                    break;
                }
                frames.push(&buf[..n]);
                while let Some(frame) = frames.next_frame() {
                    match frame {
                        Ok(frame) => {
                            if let Some(winner) = frame.winner {
                                if latest.as_ref().and_then(|f| f.winner).is_none() {
                                    info!("Match over, player {} wins {:?}", winner, frame.scores);
                                }
                            } else if frame.countdown > 0 {
                                info!("Countdown {}", frame.countdown);
                            }
                            latest = Some(frame);
                        }
                        Err(e) => warn!("Skipping frame: {}", e),
                    }
                }
            }
            _ = input_timer.tick() => {
                let command = latest
                    .as_ref()
                    .filter(|f| f.winner.is_none())
                    .and_then(|f| choose_command(f, id));
                if let Some(command) = command {
                    writer.write_all(command.as_token().as_bytes()).await?;
                }
            }
            _ = sleep_until(deadline) => {
                info!("Time limit reached");
                break;
            }
        }
    }

    Ok(())
}
