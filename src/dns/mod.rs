//! The DNS front of the translation service.
//!
//! # Handler chain
//!
//! Incoming queries pass through a chain of two handlers. The
//! [`Handler`][`handler::Handler`] dispatcher intercepts A/AAAA queries
//! for the configured domains and answers them by translating published
//! AA associations. Everything it declines flows to the
//! [`Forwarder`][`forward::Forwarder`], which relays the query to the
//! configured upstream and returns its answer untouched, so that names
//! without AA associations keep resolving normally.
//!
//! E.g. with config:
//! ```json
//! {
//!   "from": ["example.net"],
//!   "upstream": "10.10.0.1",
//!   ...
//! }
//! ```
//!
//! If `h.example.net` publishes:
//!
//! ```text
//! h.example.net.  300  IN  TXT  "AA 203.0.113.9 + 7f-00-00-01"
//! ```
//!
//! then an `A` query for `h.example.net` returns the encoded address the
//! mapper assigned to that association:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short h.example.net A
//! 10.247.1.101
//! ```
//!
//! while `A` queries for any other name under `example.net` are answered
//! by the upstream as usual.

pub mod forward;
mod handler;
pub mod server;

pub use forward::Forwarder;
pub use handler::Handler;
pub use server::new;
