use std::time::Duration;

#[macro_use]
extern crate log;

use anyhow::{Context, Result};
use clap::Parser;
use meshlockd::config::NodeConfig;
use meshlockd::mutex::{Identity, MutexInstance, TcpTransport};
use tokio::net::TcpStream;
use tokio::time;

#[derive(Parser, Debug)]
#[command(name = "meshlockd", about = "Distributed mutual-exclusion coordination daemon")]
struct Cli {
    #[command(flatten)]
    config: NodeConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.config;

    let bind_address = config.get_bind_address();
    let identity_address = config.identity_address().ok_or_else(|| {
        anyhow::anyhow!(
            "refusing to start with an ambiguous coordination identity: \
             --bind-address defaults to 0.0.0.0, which isn't a usable peer \
             identity (two default-configured instances on the same port \
             would collide); pass --identity-address or a concrete \
             --bind-address"
        )
    })?;
    let identity = Identity::resolve(&identity_address)
        .with_context(|| format!("resolving identity address {identity_address}"))?;

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding to {bind_address}"))?;

    let mut transport = TcpTransport::new(identity);
    transport.listen(listener).await?;

    for peer_addr in &config.peers {
        let stream = TcpStream::connect(peer_addr)
            .await
            .with_context(|| format!("connecting to peer {peer_addr}"))?;
        let peer_identity = Identity::resolve(peer_addr)?;
        transport.connect(peer_identity, stream).await?;
    }

    let mut instance = MutexInstance::new(config.mutex_name.clone(), identity, transport);
    for peer_addr in &config.peers {
        instance.add_peer(peer_addr)?;
    }

    instance.on_granted(|| info!("lock granted"));
    instance.on_denied(|| info!("lock denied"));
    instance.on_released(|reason| info!("lock released: {reason:?}"));
    instance.on_holder_lost(|event| warn!("holder lost: {:?}", event.holder));

    info!(
        "meshlockd listening on {bind_address} as {identity}, mutex \"{}\"",
        config.mutex_name
    );

    let mut ticker = time::interval(Duration::from_millis(200));
    loop {
        ticker.tick().await;
        instance.pump();
    }
}
