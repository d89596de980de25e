//! ipref-dns
//!
//! A name-resolution service that makes [IPREF] endpoints reachable for
//! unmodified DNS clients.
//!
//! An IPREF address is the pair of a globally routable *gateway* and an
//! opaque *reference* scoped to it. Hosts publish theirs in ordinary TXT
//! records:
//!
//! ```text
//! h.example.net.  300  IN  TXT  "AA 203.0.113.9 + 7f-00-00-01"
//! ```
//!
//! When a client asks for `A`/`AAAA` of such a name, ipref-dns harvests
//! the AA strings from the upstream resolver, resolves the gateway
//! portion where it is itself a domain name, and asks the co-located
//! mapper daemon (over its UNIX socket) for the *encoded address* that
//! stands for the `(name, gateway, reference)` triple in the local
//! routing realm. The client receives that encoded address as a plain
//! A or AAAA record and traffic to it gets translated by the gateway.
//!
//! Queries for other names, and A/AAAA queries that yield no usable AA
//! association, fall through to a plain upstream forwarder, so the
//! service can sit in front of a whole zone without breaking it.
//!
//! [IPREF]: https://github.com/ipref
//!
#![warn(clippy::pedantic)]

pub mod config;
pub mod dns;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod reference;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, IpVer, SharedConfig};
pub use dns::{Forwarder, Handler};
pub use error::Error;
pub use mapper::{DynMapper, Mapper, MapperClient};
pub use reference::Ref;
pub use resolver::{AaResolver, DnsUpstream, DynUpstream, Upstream};
