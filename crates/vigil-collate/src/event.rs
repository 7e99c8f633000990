// SPDX-License-Identifier: MIT OR Apache-2.0
//! Banner event input and HTTP-message output records.
//!
//! Both travel as JSONL: one JSON object per line, blank lines skipped.
//! Banner bytes are base64; certificate chain hashes are lowercase hex.

use std::io::BufRead;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::CollateError;
use crate::proto_ids::Transport;

/// One observed banner, as produced by the scanners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerEvent {
    /// Hostname the banner was grabbed under.
    pub name: String,
    /// Numeric address of the service.
    pub addr: IpAddr,
    /// Port of the service.
    pub port: u16,
    /// Transport protocol.
    #[serde(default)]
    pub transport: Transport,
    /// The banner bytes, base64-encoded on the wire.
    #[serde(with = "banner_bytes")]
    pub banner: Vec<u8>,
    /// Fingerprinted protocol id (transport-level heuristic).
    #[serde(default)]
    pub fpid: u16,
    /// Matched protocol id; 0 means "not matched yet".
    #[serde(default)]
    pub mpid: u16,
    /// SHA-1 of the certificate chain, lowercase hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_sha1: Option<String>,
    /// PEM-encoded certificate chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_pems: Option<String>,
}

impl BannerEvent {
    /// The event's socket address.
    pub fn sockaddr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// Decode the chain hash, if present and well-formed.
    pub fn chain_hash(&self) -> Option<[u8; 20]> {
        let hexstr = self.chain_sha1.as_deref()?;
        let bytes = hex::decode(hexstr).ok()?;
        bytes.try_into().ok()
    }
}

mod banner_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Read banner events from a JSONL stream, skipping blank lines.
pub fn read_events<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<BannerEvent, CollateError>> {
    reader.lines().filter_map(|line| match line {
        Err(e) => Some(Err(CollateError::Io(e))),
        Ok(line) => {
            if line.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str(&line).map_err(CollateError::from))
            }
        }
    })
}

/// One HTTP request seed emitted by the `httpmsgs` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMsg {
    /// URL scheme, `http` or `https`.
    pub scheme: String,
    /// Numeric address to connect to.
    pub addr: String,
    /// Hostname for the Host header.
    pub hostname: String,
    /// Port to connect to.
    pub port: String,
    /// Request path.
    pub path: String,
    /// Service the request probes.
    pub service_id: i64,
}

#[cfg(test)]
mod tests {
    use super::{read_events, BannerEvent};
    use std::io::Cursor;

    fn sample() -> String {
        let event = BannerEvent {
            name: "web1.example.com".into(),
            addr: "192.0.2.10".parse().unwrap(),
            port: 443,
            transport: Default::default(),
            banner: b"HTTP/1.1 200 OK\r\nServer: nginx/1.14.2\r\n".to_vec(),
            fpid: 5,
            mpid: 0,
            chain_sha1: Some("aa".repeat(20)),
            chain_pems: Some("-----BEGIN CERTIFICATE-----".into()),
        };
        serde_json::to_string(&event).unwrap()
    }

    #[test]
    fn jsonl_round_trip() {
        let line = sample();
        let parsed: BannerEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.name, "web1.example.com");
        assert_eq!(parsed.port, 443);
        assert!(parsed.banner.starts_with(b"HTTP/1.1"));
        assert_eq!(parsed.chain_hash(), Some([0xaa; 20]));
    }

    #[test]
    fn reader_skips_blank_lines() {
        let input = format!("{}\n\n{}\n", sample(), sample());
        let events: Vec<_> = read_events(Cursor::new(input))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn bad_lines_error() {
        let events: Vec<_> = read_events(Cursor::new("not json\n")).collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[test]
    fn defaults_for_optional_fields() {
        let line = r#"{"name":"h","addr":"10.0.0.1","port":80,"banner":""}"#;
        let parsed: BannerEvent = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.fpid, 0);
        assert_eq!(parsed.mpid, 0);
        assert!(parsed.chain_sha1.is_none());
        assert!(parsed.banner.is_empty());
    }
}
