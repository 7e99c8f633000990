// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk store layout and per-store file operations.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::StoreError;
use crate::id::{is_valid_id, IdGen, STORE_ID_LEN};

/// Length of the intermediate fan-out directory name.
const PREFIX_LEN: usize = 2;
/// Upper bound on entry name length inside a store.
const MAX_ENTRY_NAME: usize = 128;
/// Attempts at generating an unused id before giving up.
const MAX_GENERATE_TRIES: usize = 128;

/// Validate a file name inside a store.
///
/// Names must be non-empty, shorter than 128 bytes, and contain no `/` and
/// no control bytes. This is what keeps clients inside their store
/// directory.
pub fn validate_entry_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.len() >= MAX_ENTRY_NAME {
        return Err(StoreError::InvalidPath);
    }
    if name.bytes().any(|b| b == b'/' || b < 0x20) {
        return Err(StoreError::InvalidPath);
    }
    Ok(())
}

/// The store root: a base directory fanning out into per-id job
/// directories.
#[derive(Debug)]
pub struct Store {
    base: PathBuf,
}

impl Store {
    /// Create or reuse the store root under `base`.
    pub fn open_base(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        match fs::create_dir(&base) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self { base })
    }

    /// The store root directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory of `id` relative to the base: `<last-2>/<id>`.
    fn dir_of(&self, id: &str) -> PathBuf {
        let prefix = &id[id.len() - PREFIX_LEN..];
        self.base.join(prefix).join(id)
    }

    /// Enter an existing or new store with a caller-supplied id.
    ///
    /// Creation is idempotent: entering an id whose directory already
    /// exists succeeds.
    pub fn enter(&self, id: &str) -> Result<StoreHandle, StoreError> {
        self.enter_inner(id, false)
    }

    /// Generate a fresh id and enter it, retrying on collision.
    pub fn create(&self, idgen: &mut IdGen) -> Result<StoreHandle, StoreError> {
        for _ in 0..MAX_GENERATE_TRIES {
            let id = idgen.generate();
            match self.enter_inner(&id, true) {
                Ok(handle) => return Ok(handle),
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::IdExhausted(MAX_GENERATE_TRIES))
    }

    fn enter_inner(&self, id: &str, exclusive: bool) -> Result<StoreHandle, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId);
        }

        let prefix_dir = self.base.join(&id[STORE_ID_LEN - PREFIX_LEN..]);
        match fs::create_dir(&prefix_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let dir = self.dir_of(id);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if !exclusive && e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        Ok(StoreHandle {
            id: id.to_string(),
            dir,
        })
    }

    /// List all store ids as `id\0` records, optionally regex-filtered.
    pub fn list_ids(&self, must_match: Option<&Regex>) -> Vec<u8> {
        let mut out = Vec::new();
        let Ok(prefixes) = fs::read_dir(&self.base) else {
            return out;
        };

        for prefix in prefixes.flatten() {
            if !prefix.path().is_dir() || prefix.file_name().len() != PREFIX_LEN {
                continue;
            }
            let Ok(stores) = fs::read_dir(prefix.path()) else {
                continue;
            };
            for store in stores.flatten() {
                let name = store.file_name();
                let Some(name) = name.to_str() else { continue };
                if !is_valid_id(name) || !store.path().is_dir() {
                    continue;
                }
                if must_match.is_some_and(|re| !re.is_match(name)) {
                    continue;
                }
                out.extend_from_slice(name.as_bytes());
                out.push(0);
            }
        }
        out
    }

    /// List the files of store `id` as `name\0size\0` records, optionally
    /// regex-filtered.
    pub fn list_contents(
        &self,
        id: &str,
        must_match: Option<&Regex>,
    ) -> Result<Vec<u8>, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId);
        }

        let mut out = Vec::new();
        let Ok(entries) = fs::read_dir(self.dir_of(id)) else {
            return Ok(out);
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            if must_match.is_some_and(|re| !re.is_match(name)) {
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.extend_from_slice(meta.len().to_string().as_bytes());
            out.push(0);
        }
        Ok(out)
    }
}

/// An entered store: the target of `open` and `rename` requests.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    id: String,
    dir: PathBuf,
}

impl StoreHandle {
    /// The store's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The store's directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open `name` inside the store with raw `O_*` flags.
    ///
    /// Files are created with mode 0600. Failures surface as the errno to
    /// relay to the client.
    pub fn open(&self, name: &str, flags: i32) -> Result<File, StoreError> {
        validate_entry_name(name)?;

        let mut opts = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => opts.write(true),
            libc::O_RDWR => opts.read(true).write(true),
            _ => opts.read(true),
        };
        opts.create(flags & libc::O_CREAT != 0)
            .truncate(flags & libc::O_TRUNC != 0)
            .append(flags & libc::O_APPEND != 0)
            .mode(0o600);
        if flags & libc::O_EXCL != 0 {
            opts.create_new(true);
        }

        Ok(opts.open(self.dir.join(name))?)
    }

    /// Rename `from` to `to` inside the store, `rename(2)` semantics.
    pub fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        validate_entry_name(from)?;
        validate_entry_name(to)?;
        fs::rename(self.dir.join(from), self.dir.join(to))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_entry_name, Store};
    use crate::id::IdGen;
    use crate::StoreError;

    #[test]
    fn entry_name_validation() {
        assert!(validate_entry_name("job.json").is_ok());
        assert!(validate_entry_name("report-01.csv").is_ok());
        assert!(validate_entry_name("").is_err());
        assert!(validate_entry_name("a/b").is_err());
        assert!(validate_entry_name("evil\x01name").is_err());
        assert!(validate_entry_name(&"x".repeat(200)).is_err());
    }

    #[test]
    fn create_enter_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open_base(tmp.path().join("store")).unwrap();
        let mut idgen = IdGen::with_seed(7);

        let handle = store.create(&mut idgen).unwrap();
        let id = handle.id().to_string();
        let expected = tmp
            .path()
            .join("store")
            .join(&id[id.len() - 2..])
            .join(&id);
        assert_eq!(handle.dir(), expected.as_path());
        assert!(expected.is_dir());

        // re-entering the same id is idempotent
        let again = store.enter(&id).unwrap();
        assert_eq!(again.id(), id);

        assert!(matches!(
            store.enter("not-a-valid-id"),
            Err(StoreError::InvalidId)
        ));
    }

    #[test]
    fn open_rename_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open_base(tmp.path().join("store")).unwrap();
        let mut idgen = IdGen::with_seed(9);
        let handle = store.create(&mut idgen).unwrap();

        use std::io::Write;
        let mut f = handle
            .open("job.json", libc::O_WRONLY | libc::O_CREAT)
            .unwrap();
        f.write_all(b"{}").unwrap();
        drop(f);

        handle.rename("job.json", "job.done").unwrap();
        assert!(handle.dir().join("job.done").is_file());
        assert!(handle.rename("missing", "other").is_err());

        let listing = store.list_contents(handle.id(), None).unwrap();
        assert_eq!(listing, b"job.done\x002\x00".to_vec());

        let ids = store.list_ids(None);
        let expect = format!("{}\0", handle.id());
        assert_eq!(ids, expect.into_bytes());
    }

    #[test]
    fn list_with_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open_base(tmp.path().join("store")).unwrap();
        let mut idgen = IdGen::with_seed(11);
        let handle = store.create(&mut idgen).unwrap();

        for name in ["services.csv", "certs.csv", "notes.txt"] {
            handle
                .open(name, libc::O_WRONLY | libc::O_CREAT)
                .unwrap();
        }

        let re = regex::Regex::new(r"\.csv$").unwrap();
        let listing = store.list_contents(handle.id(), Some(&re)).unwrap();
        let text = String::from_utf8(listing).unwrap();
        assert!(text.contains("services.csv"));
        assert!(text.contains("certs.csv"));
        assert!(!text.contains("notes.txt"));
    }
}
