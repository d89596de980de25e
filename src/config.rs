use crate::error::Error;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::RecordType;
use trust_dns_server::client::rr::{LowerName, Name};

pub type SharedConfig = Arc<Config>;

/// An IP address family, written as `4` or `6` in the configuration.
///
/// Two independent families are configured: the family of the encoded
/// addresses handed out by the mapper (`ea-ipver`) and the family of the
/// gateway addresses accepted from AA records (`gw-ipver`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum IpVer {
    #[default]
    V4,
    V6,
}

impl IpVer {
    /// Length in bytes of an address of this family.
    pub fn byte_len(self) -> usize {
        match self {
            IpVer::V4 => 4,
            IpVer::V6 => 16,
        }
    }

    /// The 4-bit wire encoding used in the mapper protocol ip version byte.
    pub fn nibble(self) -> u8 {
        match self {
            IpVer::V4 => 4,
            IpVer::V6 => 6,
        }
    }

    /// The record type that carries addresses of this family.
    pub fn record_type(self) -> RecordType {
        match self {
            IpVer::V4 => RecordType::A,
            IpVer::V6 => RecordType::AAAA,
        }
    }

    /// True iff `ip` belongs to this family.
    pub fn matches(self, ip: IpAddr) -> bool {
        match self {
            IpVer::V4 => ip.is_ipv4(),
            IpVer::V6 => ip.is_ipv6(),
        }
    }

    pub fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVer::V4,
            IpAddr::V6(_) => IpVer::V6,
        }
    }
}

impl TryFrom<u8> for IpVer {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            4 => Ok(IpVer::V4),
            6 => Ok(IpVer::V6),
            other => Err(Error::InvalidIpVer(other)),
        }
    }
}

impl fmt::Display for IpVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nibble())
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Domain suffixes whose A/AAAA queries are translated. Empty means
    /// everything (the root zone).
    #[serde(default)]
    pub from: Vec<String>,
    /// Domain suffixes carved out of `from`.
    #[serde(default)]
    pub except: Vec<String>,
    /// Upstream resolver, `ip[:port]`; the port defaults to 53.
    pub upstream: String,
    /// UNIX socket path of the mapper daemon.
    #[serde(default = "default_mapper_socket")]
    pub mapper: String,
    #[serde(rename = "ea-ipver", default)]
    pub ea_ipver: IpVer,
    #[serde(rename = "gw-ipver", default)]
    pub gw_ipver: IpVer,
    /// Deadline applied to both the send and the receive leg of a mapper
    /// exchange, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_mapper_timeout")]
    pub mapper_timeout: Duration,
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dns_tcp_timeout: Duration,
    /// Prometheus scrape endpoint; omit to disable.
    #[serde(default)]
    pub metrics_bind_addr: Option<SocketAddr>,
}

fn default_mapper_socket() -> String {
    "/run/ipref/mapper.sock".to_string()
}

fn default_mapper_timeout() -> Duration {
    Duration::from_millis(500)
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.upstream_addr()?;
        conf.bind_addr_is_secure()?;
        Ok(conf)
    }

    /// The upstream resolver address with the default port applied.
    pub fn upstream_addr(&self) -> Result<SocketAddr, Error> {
        let upstream = self.upstream.trim();
        if let Ok(addr) = SocketAddr::from_str(upstream) {
            return Ok(addr);
        }
        if let Ok(ip) = IpAddr::from_str(upstream) {
            return Ok(SocketAddr::new(ip, 53));
        }
        Err(Error::InvalidUpstream(upstream.to_string()))
    }

    /// The normalized `from` list; an empty list falls back to the root
    /// zone so that every name is eligible.
    pub fn intercept_zones(&self) -> Result<Vec<LowerName>, Error> {
        if self.from.is_empty() {
            return Ok(vec![LowerName::from(Name::root())]);
        }
        self.from.iter().map(|zone| normalize_zone(zone)).collect()
    }

    /// The normalized `except` list.
    pub fn except_zones(&self) -> Result<Vec<LowerName>, Error> {
        self.except.iter().map(|zone| normalize_zone(zone)).collect()
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        let Some(addr) = self.metrics_bind_addr else {
            return Ok(());
        };
        match addr {
            SocketAddr::V4(v4_addr) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureMetricsBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            SocketAddr::V6(v6_addr) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureMetricsBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }
}

/// Lower-case a domain suffix and qualify it with the trailing dot.
fn normalize_zone(zone: &str) -> Result<LowerName, Error> {
    let mut name = Name::from_str_relaxed(zone)?;
    name.set_fqdn(true);
    Ok(LowerName::new(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{
                "upstream": "10.10.0.1",
                "dns_udp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_timeout": 10{extra}
            }}"#
        )
    }

    #[test]
    fn defaults() {
        let conf: Config = serde_json::from_str(&minimal("")).unwrap();
        assert_eq!(conf.mapper, "/run/ipref/mapper.sock");
        assert_eq!(conf.ea_ipver, IpVer::V4);
        assert_eq!(conf.gw_ipver, IpVer::V4);
        assert_eq!(conf.mapper_timeout, Duration::from_millis(500));
        assert!(conf.metrics_bind_addr.is_none());
        assert!(conf.from.is_empty());
    }

    #[test]
    fn ipver_parsing() {
        let conf: Config =
            serde_json::from_str(&minimal(r#", "ea-ipver": 6, "gw-ipver": 4"#)).unwrap();
        assert_eq!(conf.ea_ipver, IpVer::V6);
        assert_eq!(conf.gw_ipver, IpVer::V4);

        let res = serde_json::from_str::<Config>(&minimal(r#", "ea-ipver": 5"#));
        assert!(res.is_err());
    }

    #[test]
    fn upstream_default_port() {
        let conf: Config = serde_json::from_str(&minimal("")).unwrap();
        assert_eq!(conf.upstream_addr().unwrap(), "10.10.0.1:53".parse().unwrap());

        let conf = Config {
            upstream: "10.10.0.1:5300".to_string(),
            ..conf
        };
        assert_eq!(conf.upstream_addr().unwrap(), "10.10.0.1:5300".parse().unwrap());

        let conf = Config {
            upstream: "fd00::1".to_string(),
            ..conf
        };
        assert_eq!(conf.upstream_addr().unwrap(), "[fd00::1]:53".parse().unwrap());

        let conf = Config {
            upstream: "resolver.example.com".to_string(),
            ..conf
        };
        assert!(matches!(conf.upstream_addr(), Err(Error::InvalidUpstream(_))));
    }

    #[test]
    fn zone_normalization() {
        let conf: Config =
            serde_json::from_str(&minimal(r#", "from": ["Example.NET"], "except": ["static.example.net."]"#))
                .unwrap();
        let from = conf.intercept_zones().unwrap();
        assert_eq!(from, vec![LowerName::from_str("example.net.").unwrap()]);
        let except = conf.except_zones().unwrap();
        assert_eq!(except, vec![LowerName::from_str("static.example.net.").unwrap()]);
    }

    #[test]
    fn empty_from_matches_everything() {
        let conf: Config = serde_json::from_str(&minimal("")).unwrap();
        let from = conf.intercept_zones().unwrap();
        assert_eq!(from, vec![LowerName::from(Name::root())]);
        assert!(from[0].zone_of(&LowerName::from_str("anything.example.org.").unwrap()));
    }

    #[test]
    fn metrics_bind_must_be_private() {
        let conf: Config =
            serde_json::from_str(&minimal(r#", "metrics_bind_addr": "127.0.0.1:9100""#)).unwrap();
        assert!(conf.bind_addr_is_secure().is_ok());

        let conf: Config =
            serde_json::from_str(&minimal(r#", "metrics_bind_addr": "203.0.113.5:9100""#)).unwrap();
        assert!(matches!(
            conf.bind_addr_is_secure(),
            Err(Error::InsecureMetricsBind(_))
        ));
    }
}
