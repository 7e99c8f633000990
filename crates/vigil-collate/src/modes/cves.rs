// SPDX-License-Identifier: MIT OR Apache-2.0
//! `cves`: evaluate components against the vulnspec image.

use std::io::BufRead;

use vigil_csv::{encode_row, CsvReader};
use vigil_mem::Buf;
use vigil_vulnspec::{Flow, Interp};

use crate::error::CollateError;
use crate::out::MultiWriter;

struct CveEntry {
    component_id: u64,
    cve_id: String,
    cvss2: f32,
    cvss3: f32,
    desc: String,
}

/// Render a CVSS score; out-of-range scores print as empty fields.
fn score_field(score: f32) -> String {
    if score > 0.0 && score < 10.1 {
        format!("{score:.2}")
    } else {
        String::new()
    }
}

/// Run the mode over components.csv inputs, emitting cves.csv rows
/// sorted by component id ascending, then CVSSv2 descending.
pub fn run(
    interp: &mut Interp<'_>,
    inputs: &mut [Box<dyn BufRead>],
    out: &mut MultiWriter,
) -> Result<(), CollateError> {
    let mut reader = CsvReader::new();
    let mut entries: Vec<CveEntry> = Vec::new();

    for input in inputs {
        while reader.read_row(input)? {
            let Some(version) = reader.elem(2) else {
                continue;
            };
            if version.is_empty() {
                continue;
            }

            // The header row and malformed ids fall out here; ids start
            // at 1.
            let component_id = match reader.elem(0).map(str::parse::<u64>) {
                Some(Ok(id)) if id > 0 => id,
                _ => continue,
            };
            let vendprod = reader.elem(1).unwrap_or_default().to_string();
            let version = version.to_string();

            interp.set_subject(&vendprod, &version);
            interp.eval(|m| {
                entries.push(CveEntry {
                    component_id,
                    cve_id: m.id.to_string(),
                    cvss2: m.cvss2,
                    cvss3: m.cvss3,
                    desc: m.desc.to_string(),
                });
                Flow::Continue
            })?;
        }
    }

    entries.sort_by(|a, b| {
        a.component_id
            .cmp(&b.component_id)
            .then_with(|| b.cvss2.total_cmp(&a.cvss2))
    });

    let mut row = Buf::with_capacity(4096);
    for entry in &entries {
        row.clear();
        encode_row(
            &mut row,
            &[
                &entry.component_id.to_string(),
                &entry.cve_id,
                &score_field(entry.cvss2),
                &score_field(entry.cvss3),
                &entry.desc,
            ],
        );
        out.write_row(&row)?;
    }

    out.flush()?;
    Ok(())
}
