//! AA resolution.
//!
//! IPREF associations are published in the DNS as TXT strings of the
//! form `AA <gateway>+<reference>` at the name being queried. Resolving
//! an A/AAAA question means harvesting those strings from the upstream
//! resolver, resolving the gateway portion where it is a domain name,
//! and asking the mapper for the encoded address that stands for each
//! `(query name, gateway, reference)` triple.

pub mod aa;
pub mod upstream;

pub use aa::AaResolver;
pub use upstream::{DnsUpstream, DynUpstream, Upstream};
