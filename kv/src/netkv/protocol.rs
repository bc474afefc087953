//! Fixed-size wire records exchanged with clients over named pipes.
//!
//! Every field is a NUL-padded, fixed-width byte string; every record is
//! written/read as a single opcode byte (via `byteorder`) followed by its
//! fixed-width payload.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::constants::MAX_STRING_SIZE;

fn write_fixed(w: &mut impl Write, s: &str) -> io::Result<()> {
    let mut buf = [0u8; MAX_STRING_SIZE];
    let bytes = s.as_bytes();
    let n = bytes.len().min(MAX_STRING_SIZE);
    buf[..n].copy_from_slice(&bytes[..n]);
    w.write_all(&buf)
}

fn read_fixed(r: &mut impl Read) -> io::Result<String> {
    let mut buf = [0u8; MAX_STRING_SIZE];
    r.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(MAX_STRING_SIZE);
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Request opcodes, sent by a client on its registration/request channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOpcode {
    Connect = 1,
    Disconnect = 2,
    Subscribe = 3,
    Unsubscribe = 4,
}

impl RequestOpcode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Connect),
            2 => Some(Self::Disconnect),
            3 => Some(Self::Subscribe),
            4 => Some(Self::Unsubscribe),
            _ => None,
        }
    }
}

/// The connect/disconnect header: the three channel paths a client opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectHeader {
    pub req_path: String,
    pub resp_path: String,
    pub notif_path: String,
}

impl ConnectHeader {
    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        write_fixed(w, &self.req_path)?;
        write_fixed(w, &self.resp_path)?;
        write_fixed(w, &self.notif_path)
    }

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        Ok(ConnectHeader {
            req_path: read_fixed(r)?,
            resp_path: read_fixed(r)?,
            notif_path: read_fixed(r)?,
        })
    }
}

/// A full request record: opcode, connect header, and (for
/// subscribe/unsubscribe) a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub opcode: RequestOpcode,
    pub header: ConnectHeader,
    pub key: Option<String>,
}

impl Request {
    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u8(self.opcode as u8)?;
        self.header.write(w)?;
        if let Some(key) = &self.key {
            write_fixed(w, key)?;
        }
        Ok(())
    }

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let op = r.read_u8()?;
        let opcode = RequestOpcode::from_byte(op)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown request opcode"))?;
        let header = ConnectHeader::read(r)?;
        let key = match opcode {
            RequestOpcode::Subscribe | RequestOpcode::Unsubscribe => Some(read_fixed(r)?),
            _ => None,
        };
        Ok(Request { opcode, header, key })
    }
}

/// A single-byte acknowledgement on the response channel: `0` = success.
pub const ACK_OK: u8 = 0;
pub const ACK_FAIL: u8 = 1;

/// Notification opcodes, sent by the server on a subscriber's `notif_path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOpcode {
    Write = 5,
    Delete = 6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRecord {
    pub opcode: NotifyOpcode,
    pub key: String,
    pub value: String,
}

impl NotifyRecord {
    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u8(self.opcode as u8)?;
        write_fixed(w, &self.key)?;
        write_fixed(w, &self.value)
    }

    pub fn read(r: &mut impl Read) -> io::Result<Self> {
        let opcode = match r.read_u8()? {
            5 => NotifyOpcode::Write,
            6 => NotifyOpcode::Delete,
            _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "unknown notify opcode")),
        };
        Ok(NotifyRecord { opcode, key: read_fixed(r)?, value: read_fixed(r)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_header_round_trips() {
        let header = ConnectHeader {
            req_path: "/tmp/req1".to_string(),
            resp_path: "/tmp/resp1".to_string(),
            notif_path: "/tmp/notif1".to_string(),
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        assert_eq!(ConnectHeader::read(&mut cursor).unwrap(), header);
    }

    #[test]
    fn subscribe_request_round_trips() {
        let req = Request {
            opcode: RequestOpcode::Subscribe,
            header: ConnectHeader {
                req_path: "/tmp/req1".to_string(),
                resp_path: "/tmp/resp1".to_string(),
                notif_path: "/tmp/notif1".to_string(),
            },
            key: Some("x".to_string()),
        };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        assert_eq!(Request::read(&mut cursor).unwrap(), req);
    }

    #[test]
    fn notify_record_round_trips() {
        let rec = NotifyRecord { opcode: NotifyOpcode::Write, key: "x".to_string(), value: "42".to_string() };
        let mut buf = Vec::new();
        rec.write(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        assert_eq!(NotifyRecord::read(&mut cursor).unwrap(), rec);
    }
}
