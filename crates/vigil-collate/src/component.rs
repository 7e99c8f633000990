// SPDX-License-Identifier: MIT OR Apache-2.0
//! Component identifications rolled up by `(name, version)`.

use std::cmp::Ordering;

use vigil_table::{Fnv1a, ObjTbl, TblOps};

/// A component identification with the services it was seen on.
#[derive(Debug, Clone)]
pub struct Component {
    /// Assigned id, monotonic from 1 in first-seen order.
    pub id: u32,
    /// `vendor/product` component name.
    pub name: String,
    /// Version string; empty when the pattern captured nothing.
    pub version: String,
    /// Service ids the component was observed on, in registration order.
    pub services: Vec<i64>,
}

struct CompOps;

impl TblOps<Component> for CompOps {
    fn hash(&self, item: &Component, seed: u32) -> u32 {
        let mut h = Fnv1a::with_seed(seed);
        h.update(item.name.as_bytes());
        h.update(&[0]);
        h.update(item.version.as_bytes());
        h.finish()
    }
    fn cmp(&self, a: &Component, b: &Component) -> Ordering {
        a.name
            .cmp(&b.name)
            .then_with(|| a.version.cmp(&b.version))
    }
}

/// Deduplicating component table keyed by `(name, version)`.
#[derive(Debug)]
pub struct ComponentTable {
    tbl: ObjTbl<Component>,
    next_id: u32,
}

impl ComponentTable {
    /// Empty table hashing under `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            tbl: ObjTbl::with_capacity(seed, 64),
            next_id: 0,
        }
    }

    /// Number of distinct `(name, version)` pairs.
    pub fn len(&self) -> usize {
        self.tbl.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tbl.is_empty()
    }

    /// Register one observation of `(name, version)` on `service_id`.
    ///
    /// The first observation assigns the component id; later ones extend
    /// the service list.
    pub fn register(&mut self, name: &str, version: &str, service_id: i64) {
        let probe = Component {
            id: 0,
            name: name.to_string(),
            version: version.to_string(),
            services: Vec::new(),
        };

        let mut entry = match self.tbl.get(&CompOps, &probe) {
            Some(existing) => existing.clone(),
            None => {
                self.next_id += 1;
                Component {
                    id: self.next_id,
                    ..probe
                }
            }
        };
        entry.services.push(service_id);
        self.tbl.insert(&CompOps, entry);
    }

    /// Consume the table, yielding components sorted by
    /// `(name, version)`. Registration ends here.
    pub fn into_sorted(self) -> Vec<Component> {
        self.tbl.into_sorted(&CompOps)
    }
}
