//! Scripted collaborators shared by the resolver and dispatcher tests.

use crate::error::Error;
use crate::mapper::Mapper;
use crate::reference::Ref;
use crate::resolver::upstream::{records_for_error, Upstream};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use trust_dns_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::rdata::TXT;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinDecodable, BinEncoder};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_server::authority::{MessageRequest, MessageResponse};
use trust_dns_server::server::{Protocol, Request, ResponseHandler, ResponseInfo};

/// An [`Upstream`] that answers from a script and records every lookup.
#[derive(Default)]
pub(crate) struct MockUpstream {
    answers: HashMap<(String, RecordType), Vec<Record>>,
    failures: HashMap<(String, RecordType), &'static str>,
    rcodes: HashMap<(String, RecordType), ResponseCode>,
    pub calls: Mutex<Vec<(String, RecordType)>>,
}

impl MockUpstream {
    /// Append a TXT record with the given strings at `name`.
    pub fn with_txt(self, name: &str, ttl: u32, strings: &[&str]) -> Self {
        let name = Name::from_str(name).unwrap();
        let rdata = RData::TXT(TXT::new(strings.iter().map(ToString::to_string).collect()));
        let record = Record::from_rdata(name, ttl, rdata);
        self.with_record(RecordType::TXT, record)
    }

    /// Append an A or AAAA record for a gateway name.
    pub fn with_gateway(self, name: &str, ttl: u32, ip: IpAddr) -> Self {
        let name = Name::from_str(name).unwrap();
        let (qtype, rdata) = match ip {
            IpAddr::V4(v4) => (RecordType::A, RData::A(v4)),
            IpAddr::V6(v6) => (RecordType::AAAA, RData::AAAA(v6)),
        };
        self.with_record(qtype, Record::from_rdata(name, ttl, rdata))
    }

    /// Append a record to the answer set served for `(record name, qtype)`.
    pub fn with_record(mut self, qtype: RecordType, record: Record) -> Self {
        let key = (record.name().to_ascii().to_lowercase(), qtype);
        self.answers.entry(key).or_default().push(record);
        self
    }

    /// Script a transport-level lookup failure, as when no response
    /// arrives at all.
    pub fn failing(mut self, name: &str, qtype: RecordType, reason: &'static str) -> Self {
        self.failures.insert((name.to_lowercase(), qtype), reason);
        self
    }

    /// Script a response that arrives carrying the given rcode and no
    /// records. Surfaced through the same folding the production
    /// upstream applies, so callers see exactly what it would report.
    pub fn answering_rcode(
        mut self,
        name: &str,
        qtype: RecordType,
        response_code: ResponseCode,
    ) -> Self {
        self.rcodes.insert((name.to_lowercase(), qtype), response_code);
        self
    }

    pub fn lookups(&self) -> Vec<(String, RecordType)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Upstream for MockUpstream {
    async fn lookup(&self, name: &Name, rtype: RecordType) -> Result<Vec<Record>, Error> {
        let key = (name.to_ascii().to_lowercase(), rtype);
        self.calls.lock().unwrap().push(key.clone());
        if let Some(reason) = self.failures.get(&key) {
            return Err(Error::Upstream(ResolveErrorKind::Message(reason).into()));
        }
        if let Some(response_code) = self.rcodes.get(&key) {
            return records_for_error(
                ResolveErrorKind::NoRecordsFound {
                    query: Box::new(Query::query(name.clone(), rtype)),
                    soa: None,
                    negative_ttl: None,
                    response_code: *response_code,
                    trusted: false,
                }
                .into(),
            );
        }
        Ok(self.answers.get(&key).cloned().unwrap_or_default())
    }
}

/// A [`Mapper`] that assigns encoded addresses from a fixed table and
/// records every request. Unassigned triples are declined.
#[derive(Default)]
pub(crate) struct MockMapper {
    eas: HashMap<(String, IpAddr, Ref), IpAddr>,
    io_error: bool,
    pub calls: Mutex<Vec<(String, IpAddr, Ref)>>,
}

impl MockMapper {
    pub fn assign(mut self, dnm: &str, gw: &str, reference: Ref, ea: &str) -> Self {
        self.eas.insert(
            (dnm.to_string(), gw.parse().unwrap(), reference),
            ea.parse().unwrap(),
        );
        self
    }

    /// A mapper whose socket is gone; every call fails with an I/O error.
    pub fn failing_io() -> Self {
        MockMapper {
            io_error: true,
            ..MockMapper::default()
        }
    }

    pub fn requests(&self) -> Vec<(String, IpAddr, Ref)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mapper for MockMapper {
    async fn encoded_address(
        &self,
        dnm: &Name,
        gw: IpAddr,
        reference: Ref,
    ) -> Result<IpAddr, Error> {
        let key = (dnm.to_ascii(), gw, reference);
        self.calls.lock().unwrap().push(key.clone());
        if self.io_error {
            return Err(Error::MapperIo(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mapper gone",
            )));
        }
        self.eas.get(&key).copied().ok_or(Error::MapperDeclined)
    }
}

/// Decode a wire-encoded query into the [`Request`] the server runtime
/// would hand the dispatcher.
pub(crate) fn build_request(name: &str, rtype: RecordType) -> Request {
    let mut message = Message::new();
    message
        .set_id(4096)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_str(name).unwrap(), rtype));
    let bytes = message.to_vec().unwrap();
    let message = MessageRequest::from_bytes(&bytes).unwrap();
    Request::new(
        message,
        SocketAddr::from(([127, 0, 0, 1], 5353)),
        Protocol::Udp,
    )
}

/// A [`ResponseHandler`] that keeps the serialized response for
/// inspection instead of putting it on a wire.
#[derive(Clone, Default)]
pub(crate) struct CaptureHandler {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureHandler {
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn message(&self) -> Message {
        Message::from_bytes(&self.bytes()).unwrap()
    }
}

#[async_trait::async_trait]
impl ResponseHandler for CaptureHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        *self.bytes.lock().unwrap() = buf;
        Ok(info)
    }
}
