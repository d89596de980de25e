//! Mapper v1 wire format.
//!
//! Every constant and offset of the frame layout lives here, and both the
//! client and any stand-in for the mapper in tests must build and read
//! frames through this module only.
//!
//! A frame is an 8 byte header, an address record, and an optional string
//! TLV carrying the DNS name, zero-padded so the frame length is a
//! multiple of 4. All multi-byte integers are big-endian.

use crate::config::IpVer;
use crate::error::Error;
use crate::reference::Ref;
use std::net::IpAddr;

/// v1 signature.
pub const SIG: u8 = 0x11;

/// Header length in bytes.
pub const HDR_LEN: usize = 8;

// header offsets
pub const OFF_SIG: usize = 0;
pub const OFF_CMD: usize = 1;
pub const OFF_PKTID: usize = 2;
pub const OFF_IPVER: usize = 4;
pub const OFF_RESERVED: usize = 5;
pub const OFF_PKTLEN: usize = 6;

// command modes, top two bits of the command byte
pub const MODE_DATA: u8 = 0x00;
pub const MODE_REQ: u8 = 0x40;
pub const MODE_ACK: u8 = 0x80;
pub const MODE_NACK: u8 = 0xC0;

/// The only opcode this client uses.
pub const GET_EA: u8 = 7;

// tlv types
pub const TLV_STRING: u8 = 4;

/// Maximum frame size: header + widest address record + name TLV, rounded
/// up to a 16 byte boundary.
pub const MSG_MAX: usize = 304;

/// Length of the address record for the given families and reference.
/// The record holds EA and IP (both of the EA family), GW, and the
/// reference in its 8 or 16 byte form.
pub fn arec_len(ea_ipver: IpVer, gw_ipver: IpVer, ref_len: usize) -> usize {
    2 * ea_ipver.byte_len() + gw_ipver.byte_len() + ref_len
}

/// Build a `GET_EA` request frame. EA and IP slots are zero-filled, the
/// mapper fills EA in its reply. The name TLV is appended only when the
/// name text fits the 1..=255 length byte.
pub fn encode_get_ea(
    msgid: u16,
    ea_ipver: IpVer,
    gw: IpAddr,
    reference: Ref,
    dnm: &str,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(MSG_MAX);

    // header, PKTLEN patched once the length is known
    msg.push(SIG);
    msg.push(MODE_REQ | GET_EA);
    msg.extend_from_slice(&msgid.to_be_bytes());
    msg.push((ea_ipver.nibble() << 4) | IpVer::of(gw).nibble());
    msg.push(0);
    msg.extend_from_slice(&[0, 0]);

    // address record
    msg.resize(msg.len() + 2 * ea_ipver.byte_len(), 0);
    match gw {
        IpAddr::V4(ip) => msg.extend_from_slice(&ip.octets()),
        IpAddr::V6(ip) => msg.extend_from_slice(&ip.octets()),
    }
    if reference.wire_len() == 16 {
        msg.extend_from_slice(&reference.h.to_be_bytes());
    }
    msg.extend_from_slice(&reference.l.to_be_bytes());

    // dns name
    let dnm = dnm.as_bytes();
    if (1..=255).contains(&dnm.len()) {
        msg.push(TLV_STRING);
        msg.push(dnm.len() as u8);
        msg.extend_from_slice(dnm);
        while msg.len() % 4 != 0 {
            msg.push(0);
        }
    }

    let words = ((msg.len() / 4) as u16).to_be_bytes();
    msg[OFF_PKTLEN] = words[0];
    msg[OFF_PKTLEN + 1] = words[1];
    msg
}

/// Validate a `GET_EA` reply against what was sent and extract the
/// encoded address.
pub fn decode_get_ea(
    reply: &[u8],
    msgid: u16,
    ea_ipver: IpVer,
    gw_ipver: IpVer,
    ref_len: usize,
) -> Result<IpAddr, Error> {
    if reply.len() < HDR_LEN {
        return Err(Error::ProtocolViolation("response shorter than a v1 header"));
    }
    if reply[OFF_SIG] != SIG {
        return Err(Error::ProtocolViolation("response is not v1 protocol"));
    }
    if reply[OFF_CMD] != (MODE_ACK | GET_EA) {
        return Err(Error::MapperDeclined);
    }
    if reply[OFF_IPVER] != (ea_ipver.nibble() << 4) | gw_ipver.nibble() {
        return Err(Error::ProtocolViolation("ip version mismatch"));
    }
    let words = u16::from_be_bytes([reply[OFF_PKTLEN], reply[OFF_PKTLEN + 1]]) as usize;
    if words * 4 != reply.len() || reply.len() != HDR_LEN + arec_len(ea_ipver, gw_ipver, ref_len) {
        return Err(Error::ProtocolViolation("incorrect packet length"));
    }
    if u16::from_be_bytes([reply[OFF_PKTID], reply[OFF_PKTID + 1]]) != msgid {
        return Err(Error::ProtocolViolation("response out of sequence"));
    }

    let ea = &reply[HDR_LEN..HDR_LEN + ea_ipver.byte_len()];
    Ok(match ea_ipver {
        IpVer::V4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(ea);
            IpAddr::from(octets)
        }
        IpVer::V6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(ea);
            IpAddr::from(octets)
        }
    })
}

/// Turn a request into the ACK the mapper would send back, with the EA
/// slot filled in. Test doubles standing in for the mapper frame their
/// replies through this.
#[cfg(test)]
pub(crate) fn ack_for(
    request: &[u8],
    ea_ipver: IpVer,
    gw_ipver: IpVer,
    ref_len: usize,
    ea: &[u8],
) -> Vec<u8> {
    let len = HDR_LEN + arec_len(ea_ipver, gw_ipver, ref_len);
    let mut reply = request[..len].to_vec();
    reply[OFF_CMD] = MODE_ACK | GET_EA;
    let words = ((len / 4) as u16).to_be_bytes();
    reply[OFF_PKTLEN] = words[0];
    reply[OFF_PKTLEN + 1] = words[1];
    reply[HDR_LEN..HDR_LEN + ea.len()].copy_from_slice(ea);
    reply
}
