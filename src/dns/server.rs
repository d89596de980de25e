use crate::config::SharedConfig;
use crate::dns::forward::Forwarder;
use crate::dns::handler::Handler;
use crate::mapper::DynMapper;
use crate::metrics::HandlerMetrics;
use crate::resolver::upstream::DynUpstream;
use crate::resolver::AaResolver;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

pub async fn new(
    config: SharedConfig,
    upstream: DynUpstream,
    mapper: DynMapper,
) -> anyhow::Result<ServerFuture<Handler<Forwarder>>> {
    let udp_addr = config.dns_udp_bind_addr;
    let tcp_addr = config.dns_tcp_bind_addr;
    let tcp_timeout = config.dns_tcp_timeout;

    let resolver = AaResolver::new(
        upstream.clone(),
        mapper,
        config.ea_ipver,
        config.gw_ipver,
    );
    let dns_handler = Handler::new(
        config.intercept_zones()?,
        config.except_zones()?,
        resolver,
        HandlerMetrics::new(&udp_addr.to_string()),
        Forwarder::new(upstream),
    );

    let mut dns_server = ServerFuture::new(dns_handler);
    dns_server.register_socket(UdpSocket::bind(udp_addr).await?);
    dns_server.register_listener(TcpListener::bind(tcp_addr).await?, tcp_timeout);
    Ok(dns_server)
}
