//! Resolution of A/AAAA queries through published AA associations.

use crate::config::IpVer;
use crate::error::Error;
use crate::mapper::DynMapper;
use crate::reference::Ref;
use crate::resolver::upstream::DynUpstream;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::debug;
use trust_dns_server::client::op::LowerQuery;
use trust_dns_server::client::rr::{DNSClass, Name, RData, Record, RecordType};

/// Translates one A/AAAA question into encoded-address answers.
///
/// The resolver is re-entrant; concurrent queries share nothing beyond
/// the upstream and mapper handles.
pub struct AaResolver {
    upstream: DynUpstream,
    mapper: DynMapper,
    ea_ipver: IpVer,
    gw_ipver: IpVer,
}

impl AaResolver {
    pub fn new(
        upstream: DynUpstream,
        mapper: DynMapper,
        ea_ipver: IpVer,
        gw_ipver: IpVer,
    ) -> Self {
        AaResolver {
            upstream,
            mapper,
            ea_ipver,
            gw_ipver,
        }
    }

    /// Resolve the question through its published AA associations.
    ///
    /// TXT records at the queried name are scanned for `AA ` strings;
    /// each one contributes answers independently, and a line that fails
    /// to parse or resolve is skipped without affecting its siblings. An
    /// empty outcome reports the last reason a line was skipped, or
    /// [`Error::NoValidAa`] when nothing was even close.
    pub async fn resolve_aa(&self, query: &LowerQuery) -> Result<Vec<Record>, Error> {
        if query.query_class() != DNSClass::IN
            || !matches!(query.query_type(), RecordType::A | RecordType::AAAA)
        {
            return Err(Error::UnsupportedRrType);
        }

        // lower case, fully qualified
        let mut qname = Name::from(query.name());
        qname.set_fqdn(true);

        let txt_records = self.upstream.lookup(&qname, RecordType::TXT).await?;

        let mut answer = Vec::new();
        let mut last_reason = None;

        for rr in &txt_records {
            if rr.record_type() != RecordType::TXT || rr.dns_class() != DNSClass::IN {
                continue; // paranoia
            }
            let Some(RData::TXT(txt)) = rr.data() else {
                continue;
            };

            for chunk in txt.txt_data() {
                let line = String::from_utf8_lossy(chunk);
                let Some(addr) = line.strip_prefix("AA ") else {
                    continue;
                };
                match self.resolve_line(&qname, rr, addr, &mut answer).await {
                    Ok(()) => {}
                    Err(err @ Error::MapperIo(_)) => return Err(err),
                    Err(err) => {
                        debug!(record = %line, %err, "skipping AA record");
                        last_reason = Some(err);
                    }
                }
            }
        }

        if answer.is_empty() {
            return Err(last_reason.unwrap_or(Error::NoValidAa));
        }
        Ok(answer)
    }

    /// One AA string: `<gateway>+<reference>`, whitespace around either
    /// piece insignificant.
    async fn resolve_line(
        &self,
        qname: &Name,
        txt_rr: &Record,
        addr: &str,
        answer: &mut Vec<Record>,
    ) -> Result<(), Error> {
        let mut pieces = addr.split('+');
        let (Some(gw_part), Some(ref_part), None) = (pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(Error::InvalidAddress(addr.trim().to_string()));
        };
        let gw_part = gw_part.trim();
        let ref_part = ref_part.trim();

        let reference = Ref::parse(ref_part)?;

        if let Ok(gw) = IpAddr::from_str(gw_part) {
            if !self.gw_ipver.matches(gw) {
                // wrong family, silently skipped
                return Ok(());
            }
            return self.encode(qname, txt_rr, gw, reference, answer).await;
        }

        self.gateway_by_name(qname, txt_rr, gw_part, reference, answer)
            .await
    }

    /// Resolve a gateway written as a domain name and translate through
    /// every address of the configured family it yields.
    async fn gateway_by_name(
        &self,
        qname: &Name,
        txt_rr: &Record,
        gw_name: &str,
        reference: Ref,
        answer: &mut Vec<Record>,
    ) -> Result<(), Error> {
        let mut name = Name::from_str_relaxed(gw_name)
            .map_err(|_| Error::GatewayUnresolved(gw_name.to_string()))?
            .to_lowercase();
        name.set_fqdn(true);

        let records = match self.upstream.lookup(&name, self.gw_ipver.record_type()).await {
            Ok(records) => records,
            Err(err) => {
                debug!(gateway = %name, %err, "error resolving gateway name");
                return Err(Error::GatewayUnresolved(gw_name.to_string()));
            }
        };

        let mut usable = false;
        let mut outcome = Ok(());
        for rr in &records {
            let gw = match rr.data() {
                Some(RData::A(ip)) => IpAddr::V4(*ip),
                Some(RData::AAAA(ip)) => IpAddr::V6(*ip),
                _ => continue,
            };
            if !self.gw_ipver.matches(gw) {
                continue;
            }
            usable = true;
            if let Err(err) = self.encode(qname, txt_rr, gw, reference, answer).await {
                if matches!(err, Error::MapperIo(_)) {
                    return Err(err);
                }
                debug!(gateway = %gw, reference = %reference, %err, "error getting encoded address");
                outcome = Err(err);
            }
        }

        if !usable {
            return Err(Error::GatewayUnresolved(gw_name.to_string()));
        }
        outcome
    }

    async fn encode(
        &self,
        qname: &Name,
        txt_rr: &Record,
        gw: IpAddr,
        reference: Ref,
        answer: &mut Vec<Record>,
    ) -> Result<(), Error> {
        debug_assert!(self.gw_ipver.matches(gw));
        let ea = self.mapper.encoded_address(qname, gw, reference).await?;
        if !self.ea_ipver.matches(ea) {
            return Err(Error::WrongFamily(ea, self.ea_ipver));
        }
        answer.push(encoded_rr(txt_rr, ea));
        Ok(())
    }
}

/// An A or AAAA record carrying the encoded address, under the header of
/// the TXT record that advertised the association. Copying the TXT TTL
/// keeps downstream caches aligned with the record that is the source of
/// the mapping.
fn encoded_rr(txt_rr: &Record, ea: IpAddr) -> Record {
    let rdata = match ea {
        IpAddr::V4(ip) => RData::A(ip),
        IpAddr::V6(ip) => RData::AAAA(ip),
    };
    let mut rr = Record::from_rdata(txt_rr.name().clone(), txt_rr.ttl(), rdata);
    rr.set_dns_class(DNSClass::IN);
    rr
}
