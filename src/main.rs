use anyhow::{Context, bail};
use pdfinfer::{api, config, logging, pipeline};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ports tried in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let config = config::load_config().context("Failed to load configuration")?;

    let service = pipeline::PipelineService::from_config(&config)
        .context("Failed to initialize inference client")?;
    let app = api::create_router(Arc::new(service), &api::HttpSettings::from_config(&config));

    let listener = match config.server_port {
        Some(port) => bind_port(port).await?,
        None => bind_first_free(FALLBACK_PORTS).await?,
    };
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!(%addr, "pdfinfer listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn bind_port(port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .await
        .with_context(|| format!("Failed to bind SERVER_PORT {port}"))
}

/// Bind the first port in `ports` that is not already taken.
async fn bind_first_free(ports: RangeInclusive<u16>) -> anyhow::Result<TcpListener> {
    let (first, last) = (*ports.start(), *ports.end());
    for port in ports {
        match TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port taken");
            }
            Err(err) => return Err(err).with_context(|| format!("Failed to bind port {port}")),
        }
    }
    bail!("Every port in {first}-{last} is taken; set SERVER_PORT")
}
