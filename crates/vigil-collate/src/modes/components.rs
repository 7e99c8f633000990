// SPDX-License-Identifier: MIT OR Apache-2.0
//! `components`: roll compsvc.csv up to components with assigned ids.

use std::io::BufRead;

use vigil_csv::{encode_row, CsvReader};
use vigil_mem::Buf;
use vigil_table::seed_from_time;

use crate::component::ComponentTable;
use crate::error::CollateError;
use crate::out::MultiWriter;

/// Output streams of the `components` mode.
#[derive(Debug, Default)]
pub struct ComponentReports {
    /// components.csv sinks.
    pub components: MultiWriter,
    /// compidsvcid.csv sinks.
    pub compidsvcid: MultiWriter,
}

/// Run the mode over compsvc.csv inputs.
pub fn run(
    inputs: &mut [Box<dyn BufRead>],
    reports: &mut ComponentReports,
) -> Result<(), CollateError> {
    let mut table = ComponentTable::with_seed(seed_from_time());
    let mut reader = CsvReader::new();

    for input in inputs {
        while reader.read_row(input)? {
            let Some(service_idstr) = reader.elem(2) else {
                continue;
            };
            // Header rows and malformed ids fall out here.
            let Ok(service_id) = service_idstr.parse::<i64>() else {
                continue;
            };
            if service_id <= 0 {
                continue;
            }

            let name = reader.elem(0).unwrap_or_default();
            let version = reader.elem(1).unwrap_or_default();
            table.register(name, version, service_id);
        }
    }

    let mut row = Buf::with_capacity(1024);
    for component in table.into_sorted() {
        let id = component.id.to_string();
        row.clear();
        encode_row(&mut row, &[&id, &component.name, &component.version]);
        reports.components.write_row(&row)?;

        for service in &component.services {
            row.clear();
            encode_row(&mut row, &[&id, &service.to_string()]);
            reports.compidsvcid.write_row(&row)?;
        }
    }

    reports.components.flush()?;
    reports.compidsvcid.flush()?;
    Ok(())
}
