//! seido-relay: serves `POST /api/chat`

use log::{info, warn, error};

use seido::config::RelayConfig;

#[tokio::main]
async fn main()
{   env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("seido=info")
    ).init();

    let config = RelayConfig::from_env();
    if config.credential.resolve().is_none()
    {   warn!(
          "{} is not set; every relay call will fail until it is",
          config.credential.name()
        );
    }

    info!("Relaying to {}", config.endpoint_url());
    if let Err(e) = seido::server::serve(config).await
    {   error!("seido-relay stopped: {}", e);
        std::process::exit(1);
    }
}
