use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Points needed to win a match
    #[clap(long, default_value = "10")]
    win_score: u32,
    /// Countdown length in seconds before play starts
    #[clap(long, default_value = "3")]
    countdown: u32,
    /// Paddle movement per command
    #[clap(long, default_value = "10")]
    paddle_step: i32,
    /// Ball speed per axis per tick
    #[clap(long, default_value = "5")]
    ball_speed: i32,
    /// Simulation tick length in milliseconds
    #[clap(long, default_value = "16")]
    tick_ms: u64,
    /// Seconds to show the result before closing connections
    #[clap(long, default_value = "5")]
    cooldown_secs: u64,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            win_score: self.win_score,
            countdown: self.countdown,
            paddle_step: self.paddle_step,
            ball_speed: self.ball_speed,
            tick: Duration::from_millis(self.tick_ms),
            cooldown: Duration::from_secs(self.cooldown_secs),
            ..GameConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::bind(&address, args.game_config()).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
