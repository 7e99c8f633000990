// SPDX-License-Identifier: MIT OR Apache-2.0
//! Service records and their deduplicating table.

use std::cmp::Ordering;
use std::net::{IpAddr, SocketAddr};

use vigil_table::{Fnv1a, Interner, ObjTbl, Sym, TblOps};

use crate::chain::ChainId;
use crate::proto_ids::{ProtoId, Transport};

/// Matched-protocol slots per service.
pub const MAX_MPIDS: usize = 4;

/// One observed network service.
///
/// Identity is `(name, addr)`; everything else is accumulated during
/// banner ingestion and frozen by post-processing.
#[derive(Debug, Clone)]
pub struct Service {
    /// Interned hostname.
    pub name: Sym,
    /// Socket address of the service.
    pub addr: SocketAddr,
    /// Transport protocol.
    pub transport: Transport,
    /// Fingerprinted protocol id, the fallback classification.
    pub fpid: ProtoId,
    /// Matched protocol ids from banner matching.
    pub mpids: [ProtoId; MAX_MPIDS],
    /// Chain observed without a protocol match, if any.
    pub fp_chain: Option<ChainId>,
    /// Chain observed per matched protocol.
    pub mp_chains: [Option<ChainId>; MAX_MPIDS],
    /// Assigned ids, one per used mpid slot.
    pub service_ids: [u32; MAX_MPIDS],
}

impl Service {
    /// A fresh record for `(name, addr)`.
    pub fn new(name: Sym, addr: SocketAddr, transport: Transport, fpid: ProtoId) -> Self {
        Self {
            name,
            addr,
            transport,
            fpid,
            mpids: [ProtoId::Unknown; MAX_MPIDS],
            fp_chain: None,
            mp_chains: [None; MAX_MPIDS],
            service_ids: [0; MAX_MPIDS],
        }
    }

    /// Record a matched protocol id, deduplicating against existing
    /// slots; attaches `chain` to the slot when provided. Events past
    /// the slot limit are dropped.
    pub fn add_mpid(&mut self, mpid: ProtoId, chain: Option<ChainId>) {
        let mut i = 0;
        while i < MAX_MPIDS && !self.mpids[i].is_unknown() && self.mpids[i] != mpid {
            i += 1;
        }
        if i < MAX_MPIDS {
            self.mpids[i] = mpid;
            if chain.is_some() {
                self.mp_chains[i] = chain;
            }
        }
    }

    /// Number of used mpid slots after post-processing; slot 0 counts
    /// even when unknown, matching one emitted row per service minimum.
    pub fn used_slots(&self) -> usize {
        let mut n = 1;
        while n < MAX_MPIDS && !self.mpids[n].is_unknown() {
            n += 1;
        }
        n
    }
}

fn family_rank(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 0,
        IpAddr::V6(_) => 1,
    }
}

fn addr_cmp(a: &SocketAddr, b: &SocketAddr) -> Ordering {
    family_rank(&a.ip())
        .cmp(&family_rank(&b.ip()))
        .then_with(|| match (a.ip(), b.ip()) {
            (IpAddr::V4(x), IpAddr::V4(y)) => x.octets().cmp(&y.octets()),
            (IpAddr::V6(x), IpAddr::V6(y)) => x.octets().cmp(&y.octets()),
            _ => Ordering::Equal,
        })
        .then_with(|| a.port().cmp(&b.port()))
}

/// Hash/compare for the service table.
///
/// The hash is a single FNV-1a over `name ‖ NUL ‖ address bytes`; the
/// compare orders by `(name, address family, address, port, transport)`
/// and is the sole authority on equality.
pub struct SvcOps<'a> {
    /// Interner resolving service name symbols.
    pub interner: &'a Interner,
}

impl TblOps<Service> for SvcOps<'_> {
    fn hash(&self, item: &Service, seed: u32) -> u32 {
        let mut h = Fnv1a::with_seed(seed);
        h.update(self.interner.resolve_bytes(item.name));
        h.update(&[0]);
        match item.addr.ip() {
            IpAddr::V4(ip) => h.update(&ip.octets()),
            IpAddr::V6(ip) => h.update(&ip.octets()),
        };
        h.update(&item.addr.port().to_be_bytes());
        h.finish()
    }

    fn cmp(&self, a: &Service, b: &Service) -> Ordering {
        self.interner
            .resolve_bytes(a.name)
            .cmp(self.interner.resolve_bytes(b.name))
            .then_with(|| addr_cmp(&a.addr, &b.addr))
            .then_with(|| a.transport.cmp(&b.transport))
    }
}

/// Deduplicating table of services keyed by `(name, addr)`.
#[derive(Debug)]
pub struct ServiceTable {
    tbl: ObjTbl<Service>,
}

impl ServiceTable {
    /// Empty table hashing under `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            tbl: ObjTbl::with_capacity(seed, 4096),
        }
    }

    /// Number of distinct services.
    pub fn len(&self) -> usize {
        self.tbl.len()
    }

    /// `true` when no services are stored.
    pub fn is_empty(&self) -> bool {
        self.tbl.is_empty()
    }

    /// Apply `update` to the service for `(name, addr)`, inserting a
    /// fresh record first when absent.
    pub fn upsert(
        &mut self,
        interner: &Interner,
        name: Sym,
        addr: SocketAddr,
        transport: Transport,
        fpid: ProtoId,
        update: impl FnOnce(&mut Service),
    ) {
        let ops = SvcOps { interner };
        let probe = Service::new(name, addr, transport, fpid);
        let mut svc = match self.tbl.get(&ops, &probe) {
            Some(existing) => existing.clone(),
            None => probe,
        };
        update(&mut svc);
        self.tbl.insert(&ops, svc);
    }

    /// Consume the table, yielding services sorted by `(name, addr)`.
    ///
    /// This is the emission path; hashed access ends here.
    pub fn into_sorted(self, interner: &Interner) -> Vec<Service> {
        self.tbl.into_sorted(&SvcOps { interner })
    }
}

/// Backfill fallback classifications and assign service ids.
///
/// Runs exactly once, after the sort: services without any matched
/// protocol inherit `fpid` (and its chain) into slot 0, then every used
/// slot gets the next id starting from 1.
pub fn postprocess(services: &mut [Service]) {
    let mut next_id = 0u32;
    for svc in services {
        if svc.mpids[0].is_unknown() {
            svc.mpids[0] = svc.fpid;
            svc.mp_chains[0] = svc.fp_chain;
        }

        for k in 0..svc.used_slots() {
            next_id += 1;
            svc.service_ids[k] = next_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{postprocess, Service, ServiceTable, MAX_MPIDS};
    use crate::proto_ids::{ProtoId, Transport};
    use vigil_table::Interner;

    fn addr(s: &str) -> std::net::SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn upsert_deduplicates_by_name_and_addr() {
        let mut interner = Interner::with_seed(1);
        let name = interner.intern("host.example.com");
        let other = interner.intern("other.example.com");
        let mut table = ServiceTable::with_seed(2);

        for _ in 0..3 {
            table.upsert(
                &interner,
                name,
                addr("10.0.0.1:80"),
                Transport::Tcp,
                ProtoId::Http,
                |_| {},
            );
        }
        table.upsert(
            &interner,
            other,
            addr("10.0.0.1:80"),
            Transport::Tcp,
            ProtoId::Http,
            |_| {},
        );
        table.upsert(
            &interner,
            name,
            addr("10.0.0.1:443"),
            Transport::Tcp,
            ProtoId::Https,
            |_| {},
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn mpid_slots_dedup_and_cap() {
        let mut svc = Service::new(
            vigil_table::Interner::with_seed(0).intern("h"),
            addr("10.0.0.1:80"),
            Transport::Tcp,
            ProtoId::Unknown,
        );
        svc.add_mpid(ProtoId::Http, Some(7));
        svc.add_mpid(ProtoId::Http, None); // duplicate keeps slot and chain
        svc.add_mpid(ProtoId::Https, None);
        assert_eq!(svc.mpids[0], ProtoId::Http);
        assert_eq!(svc.mp_chains[0], Some(7));
        assert_eq!(svc.mpids[1], ProtoId::Https);

        for p in [ProtoId::Ssh, ProtoId::Ftp, ProtoId::Smtp] {
            svc.add_mpid(p, None);
        }
        // ssh and ftp fill the remaining slots; smtp is dropped.
        assert_eq!(svc.mpids[MAX_MPIDS - 1], ProtoId::Ftp);
        assert_eq!(svc.used_slots(), MAX_MPIDS);
    }

    #[test]
    fn sort_orders_by_name_then_addr() {
        let mut interner = Interner::with_seed(3);
        let alpha = interner.intern("alpha");
        let beta = interner.intern("beta");
        let mut table = ServiceTable::with_seed(4);

        for (name, a) in [
            (beta, "10.0.0.2:80"),
            (alpha, "10.0.0.9:80"),
            (alpha, "10.0.0.1:443"),
            (alpha, "10.0.0.1:80"),
        ] {
            table.upsert(&interner, name, addr(a), Transport::Tcp, ProtoId::Http, |_| {});
        }

        let sorted = table.into_sorted(&interner);
        let keys: Vec<(String, String)> = sorted
            .iter()
            .map(|s| (interner.resolve(s.name).to_string(), s.addr.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("alpha".into(), "10.0.0.1:80".into()),
                ("alpha".into(), "10.0.0.1:443".into()),
                ("alpha".into(), "10.0.0.9:80".into()),
                ("beta".into(), "10.0.0.2:80".into()),
            ]
        );
    }

    #[test]
    fn ipv4_sorts_before_ipv6() {
        let mut interner = Interner::with_seed(3);
        let name = interner.intern("host");
        let mut table = ServiceTable::with_seed(4);
        table.upsert(&interner, name, addr("[2001:db8::1]:80"), Transport::Tcp, ProtoId::Http, |_| {});
        table.upsert(&interner, name, addr("10.0.0.1:80"), Transport::Tcp, ProtoId::Http, |_| {});

        let sorted = table.into_sorted(&interner);
        assert!(sorted[0].addr.is_ipv4());
        assert!(sorted[1].addr.is_ipv6());
    }

    #[test]
    fn postprocess_backfills_and_assigns_ids() {
        let mut interner = Interner::with_seed(5);
        let name = interner.intern("h");

        let mut unmatched = Service::new(name, addr("10.0.0.1:80"), Transport::Tcp, ProtoId::Http);
        unmatched.fp_chain = Some(3);

        let mut matched = Service::new(name, addr("10.0.0.2:80"), Transport::Tcp, ProtoId::Http);
        matched.add_mpid(ProtoId::Https, None);
        matched.add_mpid(ProtoId::Imaps, None);

        let mut services = vec![unmatched, matched];
        postprocess(&mut services);

        // fallback applied
        assert_eq!(services[0].mpids[0], ProtoId::Http);
        assert_eq!(services[0].mp_chains[0], Some(3));
        assert_eq!(services[0].service_ids[0], 1);

        // matched service keeps its mpids, ids continue monotonically
        assert_eq!(services[1].mpids[0], ProtoId::Https);
        assert_eq!(services[1].service_ids, [2, 3, 0, 0]);
    }

    #[test]
    fn postprocess_is_idempotent_on_ids() {
        let mut interner = Interner::with_seed(6);
        let name = interner.intern("h");
        let mut services = vec![Service::new(
            name,
            addr("10.0.0.1:80"),
            Transport::Tcp,
            ProtoId::Http,
        )];
        postprocess(&mut services);
        let first = services[0].service_ids;
        postprocess(&mut services);
        assert_eq!(services[0].service_ids, first);
    }
}
