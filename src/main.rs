use anyhow::{anyhow, Result};
use ipref_dns::config::{Config, SharedConfig};
use ipref_dns::error::Error;
use ipref_dns::mapper::{DynMapper, MapperClient};
use ipref_dns::resolver::upstream::DnsUpstream;
use ipref_dns::resolver::DynUpstream;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("ipref-dns".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;

    // The recorder must exist before any metric handle is created.
    let recorder = match config.metrics_bind_addr {
        Some(_) => Some(install_recorder()?),
        None => None,
    };

    let upstream: DynUpstream = Arc::new(DnsUpstream::new(config.upstream_addr()?)?);
    let mapper_client = Arc::new(MapperClient::new(
        &config.mapper,
        config.ea_ipver,
        config.gw_ipver,
        config.mapper_timeout,
    ));
    let mapper: DynMapper = mapper_client.clone();

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    tracing::info!(
        "translating ea-ipver {} gw-ipver {} via mapper {}",
        config.ea_ipver,
        config.gw_ipver,
        config.mapper
    );
    let dns_server = ipref_dns::dns::server::new(config.clone(), upstream, mapper).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    let metrics_bind_addr = config.metrics_bind_addr;
    let metrics_handle = tokio::spawn(async move {
        match (metrics_bind_addr, recorder) {
            (Some(addr), Some(recorder)) => {
                tracing::info!("metrics listening on {addr}");
                ipref_dns::metrics::serve(addr, recorder).await
            }
            _ => std::future::pending().await,
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            if let Err(err) = dns_res {
                return Err(Error::Dns(err).into())
            }
        }
        Ok(metrics_res) = metrics_handle => {
            if let Err(err) = metrics_res {
                return Err(err.into())
            }
        }
    }
    mapper_client.close().await;
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipref_dns=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}

fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| anyhow!("failed to install metrics recorder: {err}"))
}
