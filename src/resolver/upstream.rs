//! Upstream DNS lookups.

use crate::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use trust_dns_proto::rr::{Name, Record, RecordType};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;

/// `DynUpstream` is a type alias for a shared [`Upstream`] used by the AA
/// resolver and the forwarder; tests substitute a scripted one.
pub type DynUpstream = Arc<dyn Upstream + Send + Sync>;

/// An async trait describing the one operation the translation pipeline
/// needs from the upstream resolver.
#[async_trait::async_trait]
pub trait Upstream {
    /// Look up `name` with the given record type. Any response that
    /// arrived with a non-success rcode, like a negative answer, is an
    /// empty record set; only I/O failures are errors.
    async fn lookup(&self, name: &Name, rtype: RecordType) -> Result<Vec<Record>, Error>;
}

/// An [`Upstream`] backed by `trust-dns-resolver`, pointed at the single
/// configured upstream address.
pub struct DnsUpstream {
    resolver: TokioAsyncResolver,
}

impl DnsUpstream {
    pub fn new(upstream: SocketAddr) -> Result<Self, Error> {
        let name_servers =
            NameServerConfigGroup::from_ips_clear(&[upstream.ip()], upstream.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], name_servers);
        let mut opts = ResolverOpts::default();
        // answers are translated per query; caching stays upstream
        opts.cache_size = 0;
        opts.use_hosts_file = false;
        let resolver = TokioAsyncResolver::tokio(config, opts)?;
        Ok(DnsUpstream { resolver })
    }
}

#[async_trait::async_trait]
impl Upstream for DnsUpstream {
    async fn lookup(&self, name: &Name, rtype: RecordType) -> Result<Vec<Record>, Error> {
        match self.resolver.lookup(name.clone(), rtype).await {
            Ok(lookup) => Ok(lookup.records().to_vec()),
            Err(err) => records_for_error(err),
        }
    }
}

/// Fold the resolver's error classification back onto the wire facts.
///
/// Every response that actually arrived is reported through the
/// no-records kind with its rcode attached: NXDomain and empty answers
/// as negative answers, SERVFAIL and the other failure rcodes as
/// untrusted ones. Whatever the rcode says, the name currently has no
/// usable records, so all of these are an empty set. Only transport and
/// protocol failures, where no response arrived at all, propagate.
pub(crate) fn records_for_error(err: ResolveError) -> Result<Vec<Record>, Error> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            debug!(%response_code, "upstream returned no usable records");
            Ok(Vec::new())
        }
        _ => Err(Error::Upstream(err)),
    }
}
