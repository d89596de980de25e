//! IPREF reference parsing.
//!
//! A reference is an opaque identifier scoped to a gateway. Operators
//! write references in whichever textual form reads naturally for them:
//!
//! - hex groups separated by dashes, e.g. `7f-00-00-01` (MAC-like),
//! - a decimal integer, optionally with `,` thousands separators,
//! - dotted decimal octets, e.g. `10.247.1.101` (IP-like).
//!
//! All forms canonicalize to the same 128 bit value so that everything
//! downstream handles a single fixed layout.

use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    // The three forms are disjoint by construction: hex requires at least
    // one dash, decimal allows only digits and commas, dotted requires at
    // least one dot.
    static ref RE_HEXREF: Regex = Regex::new(r"^[0-9a-fA-F]+(?:-[0-9a-fA-F]+)+$").unwrap();
    static ref RE_DECREF: Regex = Regex::new(r"^\d+(?:,\d+)*$").unwrap();
    static ref RE_DOTREF: Regex = Regex::new(r"^\d+(?:\.\d+)+$").unwrap();
}

/// A 128 bit reference stored as two big-endian 64 bit halves.
///
/// A reference whose high half is zero travels in 8 bytes on the mapper
/// wire, all others in 16.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ref {
    pub h: u64,
    pub l: u64,
}

impl Ref {
    /// Parse a textual reference, classifying it by the first matching
    /// form. Big-endian throughout, values right-aligned.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if RE_HEXREF.is_match(text) {
            Self::parse_hexref(text)
        } else if RE_DECREF.is_match(text) {
            Self::parse_decref(text)
        } else if RE_DOTREF.is_match(text) {
            Self::parse_dotref(text)
        } else {
            Err(Error::InvalidRef(text.to_string()))
        }
    }

    /// Number of bytes the reference occupies on the mapper wire.
    pub fn wire_len(&self) -> usize {
        if self.h == 0 {
            8
        } else {
            16
        }
    }

    fn parse_hexref(text: &str) -> Result<Self, Error> {
        let mut digits = text.replace('-', "");
        if digits.len() % 2 == 1 {
            digits.insert(0, '0');
        }
        if digits.len() > 32 {
            digits.drain(..digits.len() - 32);
        }
        let nbytes = digits.len() / 2;
        let mut buf = [0u8; 16];
        for (i, slot) in buf[16 - nbytes..].iter_mut().enumerate() {
            *slot = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidRef(text.to_string()))?;
        }
        Ok(Self::from_be_buf(buf))
    }

    fn parse_decref(text: &str) -> Result<Self, Error> {
        // commas are pure thousands separators
        let plain = text.replace(',', "");
        let l = plain
            .parse::<u64>()
            .map_err(|_| Error::InvalidRef(text.to_string()))?;
        Ok(Ref { h: 0, l })
    }

    fn parse_dotref(text: &str) -> Result<Self, Error> {
        let mut octets = Vec::with_capacity(16);
        for part in text.split('.') {
            let octet: u8 = part
                .parse()
                .map_err(|_| Error::InvalidRef(text.to_string()))?;
            octets.push(octet);
        }
        if octets.len() > 16 {
            return Err(Error::InvalidRef(text.to_string()));
        }
        let mut buf = [0u8; 16];
        buf[16 - octets.len()..].copy_from_slice(&octets);
        Ok(Self::from_be_buf(buf))
    }

    fn from_be_buf(buf: [u8; 16]) -> Self {
        let mut h = [0u8; 8];
        let mut l = [0u8; 8];
        h.copy_from_slice(&buf[..8]);
        l.copy_from_slice(&buf[8..]);
        Ref {
            h: u64::from_be_bytes(h),
            l: u64::from_be_bytes(l),
        }
    }
}

impl fmt::Display for Ref {
    /// Renders the dashed hex form, leading zero bytes trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(16);
        if self.h != 0 {
            bytes.extend_from_slice(&self.h.to_be_bytes());
        }
        bytes.extend_from_slice(&self.l.to_be_bytes());
        let skip = bytes
            .iter()
            .take_while(|b| **b == 0)
            .count()
            .min(bytes.len() - 1);
        for (i, byte) in bytes[skip..].iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
