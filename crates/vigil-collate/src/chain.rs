// SPDX-License-Identifier: MIT OR Apache-2.0
//! Certificate chain deduplication and X.509 extraction.

use std::cmp::Ordering;

use tracing::debug;
use vigil_table::{fnv1a_seeded, ObjTbl, TblOps};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::Pem;

/// Identifier of a deduplicated chain, assigned from 1 on first insert.
pub type ChainId = u32;

/// What the reports need from one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Validity start, `YYYY-MM-DD HH:MM:SS UTC`.
    pub not_before: String,
    /// Validity end, same format.
    pub not_after: String,
    /// Subject alternative names as `type:value` strings.
    pub sans: Vec<String>,
}

/// A deduplicated certificate chain.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    /// SHA-1 over the chain bytes; the dedup identity.
    pub hash: [u8; 20],
    /// Assigned chain id.
    pub id: ChainId,
    /// Parsed certificates, leaf first.
    pub certs: Vec<CertInfo>,
}

struct ChainOps;

impl TblOps<ChainEntry> for ChainOps {
    fn hash(&self, item: &ChainEntry, seed: u32) -> u32 {
        fnv1a_seeded(seed, &item.hash)
    }
    fn cmp(&self, a: &ChainEntry, b: &ChainEntry) -> Ordering {
        a.hash.cmp(&b.hash)
    }
}

/// Emission ordering: by assigned id.
struct ChainIdOps;

impl TblOps<ChainEntry> for ChainIdOps {
    fn hash(&self, item: &ChainEntry, seed: u32) -> u32 {
        fnv1a_seeded(seed, &item.hash)
    }
    fn cmp(&self, a: &ChainEntry, b: &ChainEntry) -> Ordering {
        a.id.cmp(&b.id)
    }
}

/// Hash-keyed table of certificate chains.
///
/// Chains are immutable once inserted; equal hashes always map to the
/// same id.
#[derive(Debug)]
pub struct ChainTable {
    tbl: ObjTbl<ChainEntry>,
    next_id: ChainId,
}

impl ChainTable {
    /// Empty table hashing under `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            tbl: ObjTbl::with_capacity(seed, 4),
            next_id: 0,
        }
    }

    /// Number of distinct chains.
    pub fn len(&self) -> usize {
        self.tbl.len()
    }

    /// `true` when no chains are stored.
    pub fn is_empty(&self) -> bool {
        self.tbl.is_empty()
    }

    /// Insert a chain unless its hash is already present; returns the
    /// chain id either way, or `None` when no certificate parses.
    pub fn upsert(&mut self, hash: [u8; 20], pems: &str) -> Option<ChainId> {
        let probe = ChainEntry {
            hash,
            id: 0,
            certs: Vec::new(),
        };
        if let Some(existing) = self.tbl.get(&ChainOps, &probe) {
            return Some(existing.id);
        }

        let certs = parse_chain(pems);
        if certs.is_empty() {
            debug!("certificate chain with no parsable certificates");
            return None;
        }

        self.next_id += 1;
        let id = self.next_id;
        self.tbl.insert(
            &ChainOps,
            ChainEntry { hash, id, certs },
        );
        Some(id)
    }

    /// Consume the table, yielding chains ordered by id.
    pub fn into_sorted_by_id(self) -> Vec<ChainEntry> {
        self.tbl.into_sorted(&ChainIdOps)
    }
}

/// Parse every certificate of a PEM bundle, dropping the unparsable.
fn parse_chain(pems: &str) -> Vec<CertInfo> {
    let mut certs = Vec::new();
    for pem in Pem::iter_from_buffer(pems.as_bytes()).flatten() {
        let Ok(cert) = pem.parse_x509() else {
            continue;
        };
        certs.push(extract(&cert));
    }
    certs
}

fn extract(cert: &x509_parser::certificate::X509Certificate<'_>) -> CertInfo {
    CertInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: format_time(&cert.validity().not_before),
        not_after: format_time(&cert.validity().not_after),
        sans: extract_sans(cert),
    }
}

fn format_time(t: &x509_parser::time::ASN1Time) -> String {
    let dt = t.to_datetime();
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Render SANs the way the reports expect: `type:value`, with the text
/// before the first `:` naming the SAN type.
fn extract_sans(cert: &x509_parser::certificate::X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();
    let Ok(Some(ext)) = cert.subject_alternative_name() else {
        return sans;
    };

    for name in &ext.value.general_names {
        let rendered = match name {
            GeneralName::DNSName(dns) => format!("DNS:{dns}"),
            GeneralName::RFC822Name(mail) => format!("email:{mail}"),
            GeneralName::URI(uri) => format!("URI:{uri}"),
            GeneralName::IPAddress(bytes) => match bytes.len() {
                4 => format!(
                    "IP Address:{}.{}.{}.{}",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ),
                16 => {
                    let mut segs = Vec::with_capacity(8);
                    for pair in bytes.chunks_exact(2) {
                        segs.push(format!("{:x}", u16::from_be_bytes([pair[0], pair[1]])));
                    }
                    format!("IP Address:{}", segs.join(":"))
                }
                _ => continue,
            },
            GeneralName::DirectoryName(dir) => format!("DirName:{dir}"),
            _ => continue,
        };
        sans.push(rendered);
    }
    sans
}
