use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use watchparty::{Config, Rooms, Server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Server port
  #[arg(short, long, env, default_value_t = 3000, value_parser = clap::value_parser!(u16).range(1025..))]
  port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
  if cfg!(not(debug_assertions)) {
    tracing_subscriber::fmt()
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(Level::INFO.into())
          .from_env_lossy()
          .add_directive("hyper=off".parse().unwrap())
          .add_directive("tungstenite=off".parse().unwrap()),
      )
      .init();
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(Level::DEBUG.into())
          .from_env_lossy()
          .add_directive("hyper=off".parse().unwrap())
          .add_directive("tungstenite=off".parse().unwrap()),
      )
      .without_time()
      .init();
  }

  let args = Args::parse();
  let rooms = Rooms::new(Config::default());
  let server = Server::new(args.port, rooms);
  server.listen().await
}
