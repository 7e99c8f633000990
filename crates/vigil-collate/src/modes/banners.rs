// SPDX-License-Identifier: MIT OR Apache-2.0
//! `banners`: deduplicate banner events into service and certificate
//! reports.

use std::io::BufRead;

use sha1::{Digest, Sha1};
use tracing::debug;
use vigil_mem::Buf;
use vigil_table::{seed_from_time, Interner};

use crate::chain::ChainTable;
use crate::error::CollateError;
use crate::event::read_events;
use crate::out::MultiWriter;
use crate::proto_ids::ProtoId;
use crate::service::{postprocess, ServiceTable};
use vigil_csv::encode_row;

/// Output streams of the `banners` mode.
#[derive(Debug, Default)]
pub struct BannerReports {
    /// services.csv sinks.
    pub services: MultiWriter,
    /// svccert.csv sinks.
    pub svccert: MultiWriter,
    /// certs.csv sinks.
    pub certs: MultiWriter,
    /// cert_sans.csv sinks.
    pub cert_sans: MultiWriter,
}

/// Run the mode over every banner input.
pub fn run(
    inputs: &mut [Box<dyn BufRead>],
    reports: &mut BannerReports,
) -> Result<(), CollateError> {
    let seed = seed_from_time();
    let mut interner = Interner::with_seed(seed);
    let mut chains = ChainTable::with_seed(seed);
    let mut services = ServiceTable::with_seed(seed);

    for input in inputs {
        for event in read_events(input) {
            let event = event?;
            let name = interner.intern(&event.name);
            let addr = event.sockaddr();

            let chain = match event.chain_pems.as_deref() {
                Some(pems) if !pems.is_empty() => {
                    let hash = event.chain_hash().unwrap_or_else(|| {
                        // Scanners normally hash the chain; recompute
                        // when the event lacks it.
                        Sha1::digest(pems.as_bytes()).into()
                    });
                    chains.upsert(hash, pems)
                }
                _ => None,
            };

            let mpid = ProtoId::from_u16(event.mpid);
            services.upsert(
                &interner,
                name,
                addr,
                event.transport,
                ProtoId::from_u16(event.fpid),
                |svc| {
                    if !mpid.is_unknown() {
                        svc.add_mpid(mpid, chain);
                    } else if chain.is_some() && svc.fp_chain.is_none() {
                        svc.fp_chain = chain;
                    }
                },
            );
        }
    }

    debug!(
        services = services.len(),
        chains = chains.len(),
        "banner ingestion complete"
    );

    let mut sorted = services.into_sorted(&interner);
    postprocess(&mut sorted);

    let mut row = Buf::with_capacity(2048);
    for svc in &sorted {
        let name = interner.resolve(svc.name);
        let addr = svc.addr.ip().to_string();
        let port = svc.addr.port().to_string();

        for k in 0..svc.used_slots() {
            let id = svc.service_ids[k].to_string();
            row.clear();
            encode_row(
                &mut row,
                &[
                    &id,
                    name,
                    &addr,
                    svc.transport.as_str(),
                    &port,
                    svc.mpids[k].name(),
                ],
            );
            reports.services.write_row(&row)?;

            if let Some(chain_id) = svc.mp_chains[k] {
                row.clear();
                encode_row(&mut row, &[&id, &chain_id.to_string()]);
                reports.svccert.write_row(&row)?;
            }
        }
    }

    for chain in chains.into_sorted_by_id() {
        let chain_id = chain.id.to_string();
        for (depth, cert) in chain.certs.iter().enumerate() {
            let depth = depth.to_string();
            row.clear();
            encode_row(
                &mut row,
                &[
                    &chain_id,
                    &depth,
                    &cert.subject,
                    &cert.issuer,
                    &cert.not_before,
                    &cert.not_after,
                ],
            );
            reports.certs.write_row(&row)?;

            for san in &cert.sans {
                let (kind, value) = match san.split_once(':') {
                    Some((kind, value)) => (kind, value),
                    None => ("", san.as_str()),
                };
                row.clear();
                encode_row(&mut row, &[&chain_id, &depth, kind, value]);
                reports.cert_sans.write_row(&row)?;
            }
        }
    }

    reports.services.flush()?;
    reports.svccert.flush()?;
    reports.certs.flush()?;
    reports.cert_sans.flush()?;
    Ok(())
}
