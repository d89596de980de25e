//! Client side of the IPREF mapper protocol.
//!
//! The mapper is a co-located daemon that owns the assignment of encoded
//! addresses (EAs) to `(query name, gateway, reference)` triples. This
//! module speaks its v1 request/response protocol over a sequenced-packet
//! UNIX socket: one framed message out, one framed message in.
//!
//! The mapper allocates; this client only asks.

use crate::error::Error;
use crate::reference::Ref;
use std::net::IpAddr;
use std::sync::Arc;
use trust_dns_server::client::rr::Name;

pub mod client;
pub mod wire;

#[allow(clippy::module_name_repetitions)]
pub use client::MapperClient;

/// `DynMapper` is a type alias for a shared [`Mapper`] handed to the AA
/// resolver; tests substitute a scripted implementation.
#[allow(clippy::module_name_repetitions)]
pub type DynMapper = Arc<dyn Mapper + Send + Sync>;

/// An async trait describing the one question the translation pipeline
/// asks the mapper.
#[async_trait::async_trait]
pub trait Mapper {
    /// Return the encoded address standing for the
    /// `(query name, gateway, reference)` triple within the local realm.
    async fn encoded_address(
        &self,
        dnm: &Name,
        gw: IpAddr,
        reference: Ref,
    ) -> Result<IpAddr, Error>;
}
