//! The mapper client proper.

use crate::config::IpVer;
use crate::error::Error;
use crate::mapper::{wire, Mapper};
use crate::reference::Ref;
use socket2::{Domain, SockAddr, Socket, Type};
use std::io::{ErrorKind, Read, Write};
use std::net::IpAddr;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task;
use tracing::debug;
use trust_dns_server::client::rr::Name;

/// Client for the co-located mapper daemon.
///
/// The connection is a sequenced-packet UNIX socket, dialed lazily on
/// first use and retained across requests. Any dial, send, or receive
/// failure drops the socket so the next call starts from a fresh dial.
/// One request is outstanding at a time; the request id round-trips and
/// a reply carrying the wrong id fails validation (and also resets the
/// socket, since such a reply may belong to an abandoned exchange).
///
/// No retries happen here; callers decide what a failure means.
pub struct MapperClient {
    socket_path: PathBuf,
    ea_ipver: IpVer,
    gw_ipver: IpVer,
    timeout: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Option<UnixStream>,
    msgid: u16,
}

impl Inner {
    fn next_msgid(&mut self) -> u16 {
        self.msgid = self.msgid.wrapping_add(1);
        if self.msgid == 0 {
            // 0 is reserved
            self.msgid = 1;
        }
        self.msgid
    }
}

impl MapperClient {
    pub fn new(
        socket_path: impl AsRef<Path>,
        ea_ipver: IpVer,
        gw_ipver: IpVer,
        timeout: Duration,
    ) -> Self {
        // Seed the id from the clock so that replies addressed to a
        // previous process life fail the id echo check.
        let msgid = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u16)
            .unwrap_or(0);
        MapperClient {
            socket_path: socket_path.as_ref().to_path_buf(),
            ea_ipver,
            gw_ipver,
            timeout,
            inner: Mutex::new(Inner { conn: None, msgid }),
        }
    }

    /// Drop the mapper connection, if any.
    pub async fn close(&self) {
        self.inner.lock().await.conn = None;
    }

    fn dial(&self) -> Result<UnixStream, Error> {
        let socket =
            Socket::new(Domain::UNIX, Type::SEQPACKET, None).map_err(Error::MapperIo)?;
        let addr = SockAddr::unix(&self.socket_path).map_err(Error::MapperIo)?;
        socket.connect(&addr).map_err(Error::MapperIo)?;
        let stream = UnixStream::from(socket);
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(Error::MapperIo)?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(Error::MapperIo)?;
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl Mapper for MapperClient {
    async fn encoded_address(
        &self,
        dnm: &Name,
        gw: IpAddr,
        reference: Ref,
    ) -> Result<IpAddr, Error> {
        if !self.gw_ipver.matches(gw) {
            return Err(Error::WrongFamily(gw, self.gw_ipver));
        }

        let mut inner = self.inner.lock().await;
        let conn = match inner.conn.take() {
            Some(conn) => conn,
            None => {
                debug!(path = %self.socket_path.display(), "dialing mapper");
                self.dial()?
            }
        };

        let msgid = inner.next_msgid();
        let request = wire::encode_get_ea(msgid, self.ea_ipver, gw, reference, &name_text(dnm));

        // One packet out, one packet in. The exchange is blocking with the
        // deadline carried by the socket, so it runs on the blocking pool;
        // the lock stays held, keeping a single request in flight.
        let exchanged = task::spawn_blocking(move || exchange(conn, request))
            .await
            .map_err(|err| Error::MapperIo(std::io::Error::new(ErrorKind::Other, err)))?;

        // an exchange error has already dropped the socket
        let (conn, reply) = exchanged.map_err(Error::MapperIo)?;

        let ea = wire::decode_get_ea(
            &reply,
            msgid,
            self.ea_ipver,
            self.gw_ipver,
            reference.wire_len(),
        )?;
        inner.conn = Some(conn);
        Ok(ea)
    }
}

fn exchange(mut conn: UnixStream, request: Vec<u8>) -> std::io::Result<(UnixStream, Vec<u8>)> {
    // a seqpacket send is atomic, a short count means the packet did not go
    let sent = conn.write(&request)?;
    if sent != request.len() {
        return Err(std::io::Error::new(
            ErrorKind::WriteZero,
            "short send to mapper",
        ));
    }

    let mut reply = vec![0u8; wire::MSG_MAX];
    let received = conn.read(&mut reply)?;
    if received == 0 {
        return Err(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "mapper closed the connection",
        ));
    }
    reply.truncate(received);
    Ok((conn, reply))
}

fn name_text(dnm: &Name) -> String {
    let mut text = dnm.to_ascii();
    if !text.ends_with('.') {
        text.push('.');
    }
    text
}
