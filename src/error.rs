//! Error types.

use crate::config::IpVer;
use std::net::IpAddr;
use trust_dns_proto::error::ProtoError;
use trust_dns_resolver::error::ResolveError;

/// Error enumerates the possible ipref-dns error states.
///
/// The AA resolver treats [`Error::InvalidAddress`], [`Error::InvalidRef`],
/// [`Error::GatewayUnresolved`], [`Error::WrongFamily`],
/// [`Error::MapperDeclined`] and [`Error::ProtocolViolation`] as per-line
/// conditions: the offending AA string is skipped and the remaining lines
/// are still processed. Everything else aborts the resolve.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a question is not an A or AAAA query of class INET.
    #[error("unsupported RR type")]
    UnsupportedRrType,

    /// Returned when the upstream resolver fails outright. Negative
    /// answers are not failures; they resolve to an empty record set.
    #[error("upstream resolver error")]
    Upstream(#[from] ResolveError),

    /// Returned when an AA payload does not split into a gateway part and
    /// a reference part around a single `+`.
    #[error("invalid AA record: \"{0}\"")]
    InvalidAddress(String),

    /// Returned when the reference portion of an AA record matches none of
    /// the accepted textual forms, or overflows while parsing.
    #[error("invalid reference: \"{0}\"")]
    InvalidRef(String),

    /// Returned when a gateway domain name yields no usable address.
    #[error("gateway \"{0}\" did not resolve to a usable address")]
    GatewayUnresolved(String),

    /// Returned when an address family disagrees with the configured one.
    #[error("address {0} is not an IPv{1} address")]
    WrongFamily(IpAddr, IpVer),

    /// Returned when dialing, sending to, or receiving from the mapper
    /// fails, including deadline expiry. The connection is dropped and the
    /// next call dials a fresh one.
    #[error("mapper I/O error")]
    MapperIo(#[source] std::io::Error),

    /// Returned when the mapper answered with anything other than an
    /// acknowledgment of the request.
    #[error("request declined by mapper")]
    MapperDeclined,

    /// Returned when a mapper reply is malformed: bad signature, length,
    /// ip version echo, or request id echo.
    #[error("mapper protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Returned when no AA line in any TXT record produced an answer and
    /// no more specific reason was recorded along the way.
    #[error("no valid AA records found")]
    NoValidAa,

    /// Returned for an ip version number other than 4 or 6.
    #[error("invalid ip version: {0}, must be 4 or 6")]
    InvalidIpVer(u8),

    /// Returned when the configured upstream is not an IP address with an
    /// optional port.
    #[error("invalid upstream address: \"{0}\"")]
    InvalidUpstream(String),

    /// Returned when the [`Config::metrics_bind_addr`][`crate::config::Config::metrics_bind_addr`]
    /// is not a loopback address, or an address within a private network
    /// space. The metrics endpoint is only intended for private scraping.
    #[error("metrics bind address ({0}) must be a loopback or private IP")]
    InsecureMetricsBind(IpAddr),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    Io(#[from] std::io::Error),

    /// Returned when the configuration file is not valid JSON.
    #[error("invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    /// Returned on a generic DNS protocol error.
    #[error("DNS error")]
    Dns(#[from] ProtoError),
}
