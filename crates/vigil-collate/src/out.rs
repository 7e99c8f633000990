// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fan-out writer for report streams.

use std::io::{self, Write};

use vigil_mem::Buf;

/// Writes every row to each configured output.
///
/// A row is encoded into a buffer first and written whole, so an output
/// never receives a partial row. With no outputs configured, writes are
/// dropped; modes use this to skip work for reports nobody asked for.
#[derive(Default)]
pub struct MultiWriter {
    outs: Vec<Box<dyn Write>>,
}

impl std::fmt::Debug for MultiWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiWriter")
            .field("outputs", &self.outs.len())
            .finish()
    }
}

impl MultiWriter {
    /// No outputs; all writes are dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output sink.
    pub fn push(&mut self, out: Box<dyn Write>) {
        self.outs.push(out);
    }

    /// `true` when no outputs are configured.
    pub fn is_empty(&self) -> bool {
        self.outs.is_empty()
    }

    /// Write an encoded row to every output.
    pub fn write_row(&mut self, row: &Buf) -> io::Result<()> {
        for out in &mut self.outs {
            out.write_all(row.as_slice())?;
        }
        Ok(())
    }

    /// Write raw bytes to every output.
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        for out in &mut self.outs {
            out.write_all(bytes)?;
        }
        Ok(())
    }

    /// Flush every output.
    pub fn flush(&mut self) -> io::Result<()> {
        for out in &mut self.outs {
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MultiWriter;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fans_out_to_every_sink() {
        let a = SharedBuf::default();
        let b = SharedBuf::default();
        let mut w = MultiWriter::new();
        w.push(Box::new(a.clone()));
        w.push(Box::new(b.clone()));

        w.write_all(b"row\r\n").unwrap();
        assert_eq!(&*a.0.lock().unwrap(), b"row\r\n");
        assert_eq!(&*b.0.lock().unwrap(), b"row\r\n");
    }

    #[test]
    fn empty_writer_drops_rows() {
        let mut w = MultiWriter::new();
        assert!(w.is_empty());
        w.write_all(b"ignored").unwrap();
    }
}
