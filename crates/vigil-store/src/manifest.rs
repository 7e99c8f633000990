// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-store `MANIFEST` file.
//!
//! One line per report file: `filename displayname`, in the order the
//! files were registered. The display name may contain spaces; the
//! filename may not (entry names are already restricted to printable
//! bytes, and the manifest writer rejects spaces in filenames).

use vigil_table::OrderedMap;

use crate::error::StoreError;
use crate::store::validate_entry_name;

/// Ordered `filename -> displayname` listing of a store's report files.
#[derive(Debug, Default)]
pub struct Manifest {
    entries: OrderedMap<String>,
}

impl Manifest {
    /// Empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let mut manifest = Self::new();
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (file, display) = line
                .split_once(' ')
                .ok_or_else(|| StoreError::Protocol("manifest line without display name".into()))?;
            manifest.add(file, display)?;
        }
        Ok(manifest)
    }

    /// Register `file` under `display`, replacing an earlier registration
    /// of the same file while keeping its position.
    pub fn add(&mut self, file: &str, display: &str) -> Result<(), StoreError> {
        validate_entry_name(file)?;
        if file.contains(' ') {
            return Err(StoreError::InvalidPath);
        }
        self.entries.set(file, display.to_string());
        Ok(())
    }

    /// Look up the display name of `file`.
    pub fn display_of(&self, file: &str) -> Option<&str> {
        self.entries.get(file).map(String::as_str)
    }

    /// Remove `file` from the manifest.
    pub fn remove(&mut self, file: &str) -> bool {
        self.entries.del(file).is_some()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no files are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(filename, displayname)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Render the manifest to its file format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (file, display) in self.iter() {
            out.push_str(file);
            out.push(' ');
            out.push_str(display);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::Manifest;

    #[test]
    fn round_trip_keeps_order() {
        let mut m = Manifest::new();
        m.add("services.csv", "Discovered services").unwrap();
        m.add("cves.csv", "Matched CVEs").unwrap();
        m.add("certs.csv", "Certificates").unwrap();

        let text = m.to_text();
        assert_eq!(
            text,
            "services.csv Discovered services\ncves.csv Matched CVEs\ncerts.csv Certificates\n"
        );

        let parsed = Manifest::parse(&text).unwrap();
        let files: Vec<&str> = parsed.iter().map(|(f, _)| f).collect();
        assert_eq!(files, vec!["services.csv", "cves.csv", "certs.csv"]);
        assert_eq!(parsed.display_of("cves.csv"), Some("Matched CVEs"));
    }

    #[test]
    fn re_adding_keeps_position() {
        let mut m = Manifest::new();
        m.add("a.csv", "First").unwrap();
        m.add("b.csv", "Second").unwrap();
        m.add("a.csv", "Renamed").unwrap();
        let rows: Vec<(&str, &str)> = m.iter().collect();
        assert_eq!(rows, vec![("a.csv", "Renamed"), ("b.csv", "Second")]);
    }

    #[test]
    fn rejects_bad_lines_and_names() {
        assert!(Manifest::parse("nodisplayname\n").is_err());
        let mut m = Manifest::new();
        assert!(m.add("has space.csv", "x").is_err());
        assert!(m.add("sub/dir.csv", "x").is_err());
    }
}
