// SPDX-License-Identifier: MIT OR Apache-2.0
//! `httpmsgs`: seed HTTP probe requests from discovered services.

use std::io::BufRead;

use vigil_csv::CsvReader;

use crate::error::CollateError;
use crate::event::HttpMsg;
use crate::out::MultiWriter;

/// Paths probed on every HTTP-ish service.
pub const SEED_PATHS: &[&str] = &["/", "/wp-content/uploads/"];

/// Run the mode over services.csv inputs, emitting JSONL HTTP messages.
pub fn run(
    inputs: &mut [Box<dyn BufRead>],
    out: &mut MultiWriter,
) -> Result<(), CollateError> {
    let mut reader = CsvReader::new();

    for input in inputs {
        while reader.read_row(input)? {
            let Some(service) = reader.elem(5) else {
                continue;
            };
            if !service.starts_with("http") {
                continue;
            }

            let service_id: i64 = match reader.elem(0).map(str::parse) {
                Some(Ok(id)) => id,
                _ => continue,
            };
            let addr = reader.elem(2).unwrap_or_default();
            let hostname = match reader.elem(1) {
                Some("") | None => addr,
                Some(name) => name,
            };
            let port = reader.elem(4).unwrap_or_default();

            for path in SEED_PATHS {
                let msg = HttpMsg {
                    scheme: service.to_string(),
                    addr: addr.to_string(),
                    hostname: hostname.to_string(),
                    port: port.to_string(),
                    path: (*path).to_string(),
                    service_id,
                };
                let mut line = serde_json::to_vec(&msg)?;
                line.push(b'\n');
                out.write_all(&line)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::event::HttpMsg;
    use crate::out::MultiWriter;
    use std::io::{BufRead, Cursor};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const CSV: &str = "Service ID,Name,Address,Transport,Port,Service\r\n\
        1,web1.example.com,192.0.2.10,tcp,443,https\r\n\
        2,,192.0.2.11,tcp,80,http\r\n\
        3,mail.example.com,192.0.2.20,tcp,25,smtp\r\n";

    #[test]
    fn http_services_fan_out_over_seed_paths() {
        let sink = Sink::default();
        let mut out = MultiWriter::new();
        out.push(Box::new(sink.clone()));

        let mut inputs: Vec<Box<dyn BufRead>> = vec![Box::new(Cursor::new(CSV))];
        run(&mut inputs, &mut out).unwrap();

        let bytes = sink.0.lock().unwrap().clone();
        let msgs: Vec<HttpMsg> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        // two http-ish services, two seed paths each; smtp is skipped
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].scheme, "https");
        assert_eq!(msgs[0].hostname, "web1.example.com");
        assert_eq!(msgs[0].path, "/");
        assert_eq!(msgs[1].path, "/wp-content/uploads/");

        // hostname falls back to the address when the column is empty
        assert_eq!(msgs[2].hostname, "192.0.2.11");
        assert_eq!(msgs[2].service_id, 2);
        assert!(msgs.iter().all(|m| m.scheme.starts_with("http")));
    }
}
