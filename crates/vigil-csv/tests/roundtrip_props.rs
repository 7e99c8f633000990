// SPDX-License-Identifier: MIT OR Apache-2.0
//! Round-trip property: decoding an encoded row yields the same fields.

use proptest::prelude::*;
use vigil_csv::{encode_row, CsvReader};
use vigil_mem::Buf;

fn arb_field() -> impl Strategy<Value = String> {
    // Printable text plus the characters that force quoting.
    "[ -~]{0,12}"
}

proptest! {
    #[test]
    fn encode_then_read_round_trips(
        rows in proptest::collection::vec(
            proptest::collection::vec(arb_field(), 1..=6),
            1..=8,
        )
    ) {
        let mut buf = Buf::new();
        for row in &rows {
            let fields: Vec<&str> = row.iter().map(String::as_str).collect();
            encode_row(&mut buf, &fields);
        }

        let mut reader = CsvReader::new();
        let mut input = std::io::Cursor::new(buf.into_vec());
        for row in &rows {
            prop_assert!(reader.read_row(&mut input).unwrap());
            prop_assert_eq!(reader.ncols(), row.len());
            for (i, field) in row.iter().enumerate() {
                prop_assert_eq!(reader.elem(i), Some(field.as_str()));
            }
        }
        prop_assert!(!reader.read_row(&mut input).unwrap());
    }
}
