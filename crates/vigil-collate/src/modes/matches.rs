// SPDX-License-Identifier: MIT OR Apache-2.0
//! `matches`: identify components in banners and join them to service
//! ids.

use std::io::BufRead;

use tracing::debug;
use vigil_matcher::{MatchKind, Matcher};
use vigil_mem::Buf;
use vigil_table::seed_from_time;

use crate::component::ComponentTable;
use crate::error::CollateError;
use crate::event::read_events;
use crate::out::MultiWriter;
use crate::proto_ids::ProtoId;
use crate::svclut::SvcLut;
use vigil_csv::encode_row;

/// Run the mode: banners in, compsvc.csv out, with services.csv
/// providing the id join. The matcher must already be compiled (the
/// built-in table or a pattern file).
pub fn run(
    matcher: &mut Matcher,
    banner_inputs: &mut [Box<dyn BufRead>],
    services_inputs: &mut [Box<dyn BufRead>],
    out: &mut MultiWriter,
) -> Result<(), CollateError> {
    let seed = seed_from_time();

    let mut lut = SvcLut::with_seed(seed);
    for input in services_inputs {
        lut.load(input)?;
    }

    let mut components = ComponentTable::with_seed(seed);

    for input in banner_inputs {
        for event in read_events(input) {
            let event = event?;
            matcher.match_data(&event.banner)?;

            let mpid = ProtoId::from_u16(event.mpid);
            let proto = if mpid.is_unknown() {
                ProtoId::from_u16(event.fpid)
            } else {
                mpid
            };
            let service_id = lut.lookup(
                &event.name,
                &event.addr.to_string(),
                event.transport.as_str(),
                &event.port.to_string(),
                proto.name(),
            );

            while let Some(id) = matcher.next_match() {
                if matcher.kind_of(id) != Some(MatchKind::Component) {
                    continue;
                }
                let Some(service_id) = service_id else {
                    debug!(name = %event.name, "no service row for matched banner");
                    continue;
                };

                let name = matcher.name_of(id).unwrap_or_default().to_string();
                let version = matcher
                    .substring(id, &event.banner)
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default();
                components.register(&name, &version, service_id);
            }
        }
    }

    let mut row = Buf::with_capacity(1024);
    for component in components.into_sorted() {
        for service in &component.services {
            row.clear();
            encode_row(
                &mut row,
                &[&component.name, &component.version, &service.to_string()],
            );
            out.write_row(&row)?;
        }
    }

    out.flush()?;
    Ok(())
}
