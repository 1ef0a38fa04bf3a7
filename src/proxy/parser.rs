//! PROXY Protocol Parser
//!
//! Reads exactly one PROXY v1 (text) or v2 (binary) header from a blocking
//! reader and decodes it with the `ppp` crate. The reader is never advanced
//! past the end of the header, so whatever follows stays in the stream for
//! the launched command.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::net::{IpAddr, SocketAddr};

use bytes::{Bytes, BytesMut};

/// PROXY v1 signature: "PROXY "
const PROXY_V1_SIGNATURE: &[u8] = b"PROXY ";

/// PROXY v2 signature (12 bytes)
const PROXY_V2_SIGNATURE: &[u8] = b"\r\n\r\n\x00\r\nQUIT\n";

/// Bytes read before the version is known. Both signatures are at least
/// this long and differ in their first byte.
const PROBE_LEN: usize = 6;

/// v2 fixed preamble: signature, version/command, family/protocol, length
const V2_PREAMBLE_LEN: usize = 16;

/// Maximum PROXY v1 header size, CRLF included
const MAX_V1_HEADER_SIZE: usize = 107;

/// Maximum PROXY v2 header size accepted
const MAX_V2_HEADER_SIZE: usize = 536;

/// PROXY protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyVersion {
    V1,
    V2,
}

impl ProxyVersion {
    pub fn number(self) -> u8 {
        match self {
            ProxyVersion::V1 => 1,
            ProxyVersion::V2 => 2,
        }
    }
}

/// A decoded PROXY header.
///
/// After a successful decode exactly one of these holds: `local` is set,
/// `unknown` is non-empty, or both addresses are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHeader {
    pub version: ProxyVersion,

    /// LOCAL command: health check or other non-proxied connection
    pub local: bool,

    /// Original client address
    pub source: Option<SocketAddr>,

    /// Address the client connected to
    pub destination: Option<SocketAddr>,

    /// Raw header bytes when the address family or transport is not
    /// understood; empty otherwise
    pub unknown: Bytes,
}

impl fmt::Display for ProxyHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} header parsed, local={}, source={}, destination={}, unknown={}",
            self.version.number(),
            self.local,
            DisplayAddr(self.source),
            DisplayAddr(self.destination),
            hex::encode(&self.unknown),
        )
    }
}

struct DisplayAddr(Option<SocketAddr>);

impl fmt::Display for DisplayAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{}", addr),
            None => Ok(()),
        }
    }
}

/// Errors that can occur during PROXY header parsing
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Invalid or malformed PROXY header
    #[error("invalid PROXY header: {0}")]
    InvalidHeader(String),
    /// IO error reading from the stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Stream closed before header received
    #[error("input closed before a complete PROXY header was read")]
    ConnectionClosed,
    /// PROXY protocol not detected (no signature)
    #[error("no PROXY protocol signature")]
    NotProxyProtocol,
}

/// Read and decode one PROXY protocol header.
///
/// Blocks until a complete header has been read or an error occurs.
pub fn read_proxy_header<R: Read>(reader: &mut R) -> Result<ProxyHeader, ProxyError> {
    let mut buf = BytesMut::with_capacity(MAX_V2_HEADER_SIZE);
    buf.resize(PROBE_LEN, 0);
    read_full(reader, &mut buf[..])?;

    if buf[..] == PROXY_V1_SIGNATURE[..] {
        read_v1_line(reader, &mut buf)?;
        parse_v1_header(buf.freeze())
    } else if buf[..] == PROXY_V2_SIGNATURE[..PROBE_LEN] {
        read_v2_frame(reader, &mut buf)?;
        parse_v2_header(buf.freeze())
    } else {
        Err(ProxyError::NotProxyProtocol)
    }
}

fn read_full<R: Read>(reader: &mut R, dst: &mut [u8]) -> Result<(), ProxyError> {
    reader.read_exact(dst).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ProxyError::ConnectionClosed,
        _ => ProxyError::Io(e),
    })
}

/// Extend `buf` one byte at a time until it ends with CRLF
fn read_v1_line<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<(), ProxyError> {
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n") {
        if buf.len() >= MAX_V1_HEADER_SIZE {
            return Err(ProxyError::InvalidHeader("v1 header too long".to_string()));
        }
        read_full(reader, &mut byte)?;
        buf.extend_from_slice(&byte);
    }
    Ok(())
}

/// Extend `buf` to the full v2 header declared by its length field
fn read_v2_frame<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<(), ProxyError> {
    let start = buf.len();
    buf.resize(V2_PREAMBLE_LEN, 0);
    read_full(reader, &mut buf[start..])?;

    if buf[..PROXY_V2_SIGNATURE.len()] != *PROXY_V2_SIGNATURE {
        return Err(ProxyError::NotProxyProtocol);
    }

    // Length is in bytes 14-15 (big-endian u16)
    let header_len = u16::from_be_bytes([buf[14], buf[15]]) as usize;
    let total_len = V2_PREAMBLE_LEN + header_len;
    if total_len > MAX_V2_HEADER_SIZE {
        return Err(ProxyError::InvalidHeader(format!(
            "v2 header too large: {} bytes",
            total_len
        )));
    }

    buf.resize(total_len, 0);
    read_full(reader, &mut buf[V2_PREAMBLE_LEN..])
}

/// Parse a complete PROXY v1 (text) header
fn parse_v1_header(raw: Bytes) -> Result<ProxyHeader, ProxyError> {
    let header = ppp::v1::Header::try_from(&raw[..])
        .map_err(|e| ProxyError::InvalidHeader(format!("v1 parse error: {:?}", e)))?;

    let addresses = match header.addresses {
        ppp::v1::Addresses::Tcp4(addrs) => Some((
            SocketAddr::new(IpAddr::V4(addrs.source_address), addrs.source_port),
            SocketAddr::new(IpAddr::V4(addrs.destination_address), addrs.destination_port),
        )),
        ppp::v1::Addresses::Tcp6(addrs) => Some((
            SocketAddr::new(IpAddr::V6(addrs.source_address), addrs.source_port),
            SocketAddr::new(IpAddr::V6(addrs.destination_address), addrs.destination_port),
        )),
        ppp::v1::Addresses::Unknown => None,
    };

    Ok(proxied(ProxyVersion::V1, addresses, raw))
}

/// Parse a complete PROXY v2 (binary) header
fn parse_v2_header(raw: Bytes) -> Result<ProxyHeader, ProxyError> {
    let header = ppp::v2::Header::try_from(&raw[..])
        .map_err(|e| ProxyError::InvalidHeader(format!("v2 parse error: {:?}", e)))?;

    if matches!(header.command, ppp::v2::Command::Local) {
        return Ok(ProxyHeader {
            version: ProxyVersion::V2,
            local: true,
            source: None,
            destination: None,
            unknown: Bytes::new(),
        });
    }

    // Only stream transports carry a TCP client address
    let addresses = match (&header.protocol, &header.addresses) {
        (ppp::v2::Protocol::Stream, ppp::v2::Addresses::IPv4(addrs)) => Some((
            SocketAddr::new(IpAddr::V4(addrs.source_address), addrs.source_port),
            SocketAddr::new(IpAddr::V4(addrs.destination_address), addrs.destination_port),
        )),
        (ppp::v2::Protocol::Stream, ppp::v2::Addresses::IPv6(addrs)) => Some((
            SocketAddr::new(IpAddr::V6(addrs.source_address), addrs.source_port),
            SocketAddr::new(IpAddr::V6(addrs.destination_address), addrs.destination_port),
        )),
        _ => None,
    };

    Ok(proxied(ProxyVersion::V2, addresses, raw))
}

fn proxied(
    version: ProxyVersion,
    addresses: Option<(SocketAddr, SocketAddr)>,
    raw: Bytes,
) -> ProxyHeader {
    match addresses {
        Some((source, destination)) => ProxyHeader {
            version,
            local: false,
            source: Some(source),
            destination: Some(destination),
            unknown: Bytes::new(),
        },
        None => ProxyHeader {
            version,
            local: false,
            source: None,
            destination: None,
            unknown: raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn v2_header(command: u8, family: u8, addresses: &[u8]) -> Vec<u8> {
        let mut buf = PROXY_V2_SIGNATURE.to_vec();
        buf.push(0x20 | command);
        buf.push(family);
        buf.extend_from_slice(&(addresses.len() as u16).to_be_bytes());
        buf.extend_from_slice(addresses);
        buf
    }

    fn tcp4_block() -> Vec<u8> {
        let mut block = vec![203, 0, 113, 5, 198, 51, 100, 9];
        block.extend_from_slice(&51000u16.to_be_bytes());
        block.extend_from_slice(&443u16.to_be_bytes());
        block
    }

    #[test]
    fn test_proxy_v2_signature() {
        assert_eq!(PROXY_V2_SIGNATURE.len(), 12);
        assert!(PROXY_V2_SIGNATURE.len() >= PROBE_LEN);
        assert_ne!(PROXY_V1_SIGNATURE[0], PROXY_V2_SIGNATURE[0]);
    }

    #[test]
    fn test_parse_v1_tcp4() {
        let mut cursor = Cursor::new(b"PROXY TCP4 192.168.1.1 10.0.0.1 12345 80\r\n".to_vec());

        let header = read_proxy_header(&mut cursor).unwrap();

        assert_eq!(header.version, ProxyVersion::V1);
        assert!(!header.local);
        assert_eq!(header.source, Some("192.168.1.1:12345".parse().unwrap()));
        assert_eq!(header.destination, Some("10.0.0.1:80".parse().unwrap()));
        assert!(header.unknown.is_empty());
    }

    #[test]
    fn test_parse_v1_tcp6() {
        let mut cursor = Cursor::new(b"PROXY TCP6 ::1 ::2 12345 80\r\n".to_vec());

        let header = read_proxy_header(&mut cursor).unwrap();

        assert_eq!(header.source, Some("[::1]:12345".parse().unwrap()));
        assert_eq!(header.destination, Some("[::2]:80".parse().unwrap()));
    }

    #[test]
    fn test_parse_v1_unknown_keeps_raw_line() {
        let mut cursor = Cursor::new(b"PROXY UNKNOWN\r\n".to_vec());

        let header = read_proxy_header(&mut cursor).unwrap();

        assert!(!header.local);
        assert_eq!(&header.unknown[..], b"PROXY UNKNOWN\r\n");
        assert_eq!(header.source, None);
        assert_eq!(header.destination, None);
    }

    #[test]
    fn test_v1_leaves_payload_unread() {
        let mut cursor = Cursor::new(b"PROXY TCP4 1.2.3.4 5.6.7.8 1 2\r\nGET / HTTP/1.0\r\n".to_vec());

        read_proxy_header(&mut cursor).unwrap();

        let mut rest = String::new();
        cursor.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "GET / HTTP/1.0\r\n");
    }

    #[test]
    fn test_v1_without_crlf_is_rejected() {
        let mut line = b"PROXY TCP4 ".to_vec();
        line.extend(std::iter::repeat(b'1').take(200));
        let mut cursor = Cursor::new(line);

        let err = read_proxy_header(&mut cursor).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidHeader(_)));
    }

    #[test]
    fn test_v1_malformed_addresses() {
        let mut cursor = Cursor::new(b"PROXY TCP4 not-an-ip 10.0.0.1 1 2\r\n".to_vec());

        let err = read_proxy_header(&mut cursor).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidHeader(_)));
    }

    #[test]
    fn test_parse_v2_tcp4() {
        let mut bytes = v2_header(0x01, 0x11, &tcp4_block());
        bytes.extend_from_slice(b"payload");
        let mut cursor = Cursor::new(bytes);

        let header = read_proxy_header(&mut cursor).unwrap();

        assert_eq!(header.version, ProxyVersion::V2);
        assert_eq!(header.source, Some("203.0.113.5:51000".parse().unwrap()));
        assert_eq!(header.destination, Some("198.51.100.9:443".parse().unwrap()));

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"payload");
    }

    #[test]
    fn test_parse_v2_local() {
        let mut cursor = Cursor::new(v2_header(0x00, 0x00, &[]));

        let header = read_proxy_header(&mut cursor).unwrap();

        assert!(header.local);
        assert!(header.unknown.is_empty());
        assert_eq!(header.source, None);
    }

    #[test]
    fn test_parse_v2_datagram_is_unknown() {
        let raw = v2_header(0x01, 0x12, &tcp4_block());
        let mut cursor = Cursor::new(raw.clone());

        let header = read_proxy_header(&mut cursor).unwrap();

        assert!(!header.local);
        assert_eq!(&header.unknown[..], &raw[..]);
        assert_eq!(header.source, None);
    }

    #[test]
    fn test_v2_oversized_length() {
        let mut raw = v2_header(0x01, 0x11, &[]);
        raw[14..16].copy_from_slice(&1000u16.to_be_bytes());
        let mut cursor = Cursor::new(raw);

        let err = read_proxy_header(&mut cursor).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidHeader(_)));
    }

    #[test]
    fn test_truncated_input() {
        let mut cursor = Cursor::new(b"PROXY TCP4 1.2.3.4".to_vec());

        let err = read_proxy_header(&mut cursor).unwrap_err();
        assert!(matches!(err, ProxyError::ConnectionClosed));
    }

    #[test]
    fn test_no_signature() {
        let mut cursor = Cursor::new(b"GET / HTTP/1.1\r\n".to_vec());

        let err = read_proxy_header(&mut cursor).unwrap_err();
        assert!(matches!(err, ProxyError::NotProxyProtocol));
    }

    #[test]
    fn test_summary_line() {
        let header = ProxyHeader {
            version: ProxyVersion::V1,
            local: false,
            source: None,
            destination: None,
            unknown: Bytes::from_static(b"\x01\xff"),
        };

        assert_eq!(
            header.to_string(),
            "version 1 header parsed, local=false, source=, destination=, unknown=01ff"
        );
    }
}
