use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dns::client::{DnsClient, RoundRobinClient, UdpClient};
use log::info;

use crate::config::Config;

mod config;
mod dns;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = Config::init()?;
    info!("Starting service");
    if let Some(metrics_bind_addr) = config.metrics_bind_addr {
        let (metrics_addr, metrics_server) =
            dns::metrics::create_metrics_server(metrics_bind_addr)
                .with_context(|| format!("Failed to bind metrics on {}", metrics_bind_addr))?;
        info!("Serving metrics on {}", metrics_addr);
        tokio::spawn(metrics_server);
    }
    let (local_addr, server) = create_server(&config).await?;
    info!("Listening for dns queries on {}", local_addr);
    tokio::select! {
        _ = server => (),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down");
        }
    }
    Ok(())
}

async fn create_server(
    config: &Config,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
    config.validate()?;
    let dns_client = Arc::new(create_dns_client(config)?);
    info!(
        "Forwarding to {:?} with timeout {:?}",
        dns_client
            .clients()
            .iter()
            .map(UdpClient::server_addr)
            .collect::<Vec<_>>(),
        config.timeout()
    );
    dns::server::create_udp_server(config.bind_addr, move |query| {
        let dns_client = dns_client.clone();
        async move { dns_client.send(query).await }
    })
    .await
}

fn create_dns_client(config: &Config) -> Result<RoundRobinClient<UdpClient>> {
    let timeout = config.timeout();
    let clients = config
        .upstream_servers
        .iter()
        .map(|server| UdpClient::new(server.as_str(), timeout))
        .collect();
    RoundRobinClient::new(clients)
}
