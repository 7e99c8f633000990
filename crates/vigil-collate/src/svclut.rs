// SPDX-License-Identifier: MIT OR Apache-2.0
//! Service id lookup table built from services.csv.

use std::cmp::Ordering;
use std::io::BufRead;

use vigil_csv::CsvReader;
use vigil_table::{Fnv1a, ObjTbl, TblOps};

use crate::error::CollateError;

#[derive(Debug, Clone, Default)]
struct Entry {
    service_id: i64,
    hostname: String,
    addr: String,
    transport: String,
    port: String,
    service: String,
}

struct LutOps;

impl TblOps<Entry> for LutOps {
    fn hash(&self, item: &Entry, seed: u32) -> u32 {
        let mut h = Fnv1a::with_seed(seed);
        for field in [
            &item.hostname,
            &item.addr,
            &item.transport,
            &item.port,
            &item.service,
        ] {
            h.update(field.as_bytes());
            h.update(&[0]);
        }
        h.finish()
    }

    // The id is what the lookup produces, so it takes no part in the
    // comparison.
    fn cmp(&self, a: &Entry, b: &Entry) -> Ordering {
        a.hostname
            .cmp(&b.hostname)
            .then_with(|| a.addr.cmp(&b.addr))
            .then_with(|| a.transport.cmp(&b.transport))
            .then_with(|| a.port.cmp(&b.port))
            .then_with(|| a.service.cmp(&b.service))
    }
}

/// Finds a service id by its `(hostname, addr, transport, port, service)`
/// tuple, as written to services.csv.
#[derive(Debug)]
pub struct SvcLut {
    tbl: ObjTbl<Entry>,
}

impl SvcLut {
    /// Empty table hashing under `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            tbl: ObjTbl::with_capacity(seed, 4096),
        }
    }

    /// Number of loaded rows.
    pub fn len(&self) -> usize {
        self.tbl.len()
    }

    /// `true` when nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.tbl.is_empty()
    }

    /// Load rows from a services.csv stream. Rows whose first column is
    /// not numeric (the header among them) are skipped.
    pub fn load<R: BufRead>(&mut self, input: &mut R) -> Result<(), CollateError> {
        let mut reader = CsvReader::new();
        while reader.read_row(input)? {
            let Some(id_field) = reader.elem(0) else {
                continue;
            };
            if !id_field.as_bytes().first().is_some_and(u8::is_ascii_digit) {
                continue;
            }
            let Ok(service_id) = id_field.parse::<i64>() else {
                continue;
            };

            let entry = Entry {
                service_id,
                hostname: reader.elem(1).unwrap_or_default().to_string(),
                addr: reader.elem(2).unwrap_or_default().to_string(),
                transport: reader.elem(3).unwrap_or_default().to_string(),
                port: reader.elem(4).unwrap_or_default().to_string(),
                service: reader.elem(5).unwrap_or_default().to_string(),
            };
            self.tbl.insert(&LutOps, entry);
        }
        Ok(())
    }

    /// Look up a service id by its composite key.
    pub fn lookup(
        &self,
        hostname: &str,
        addr: &str,
        transport: &str,
        port: &str,
        service: &str,
    ) -> Option<i64> {
        let probe = Entry {
            service_id: 0,
            hostname: hostname.to_string(),
            addr: addr.to_string(),
            transport: transport.to_string(),
            port: port.to_string(),
            service: service.to_string(),
        };
        self.tbl.get(&LutOps, &probe).map(|e| e.service_id)
    }
}
