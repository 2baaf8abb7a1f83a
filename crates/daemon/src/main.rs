use codescope_core::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
  // Logs go to stderr; stdout is the JSON-RPC channel
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let config = Config::from_env();

  if let Err(e) = daemon::run(config).await {
    tracing::error!("Daemon failed: {e}");
    std::process::exit(1);
  }
}
