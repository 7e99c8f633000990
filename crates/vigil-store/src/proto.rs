// SPDX-License-Identifier: MIT OR Apache-2.0
//! The store request protocol.
//!
//! Frames are netstrings: `<decimal-len>:<payload>,`. A payload is a set
//! of `key=value` records separated by newlines; keys are ASCII
//! identifiers and values are raw bytes that may not contain a newline
//! (every value carried here is validated elsewhere to exclude control
//! bytes, except list results whose records are NUL-separated).

use vigil_table::OrderedMap;

use crate::error::StoreError;

/// Largest accepted frame payload.
pub const MAX_FRAME: usize = 1024 * 1024;

/// Encode `payload` as a netstring frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 12);
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(payload);
    out.push(b',');
    out
}

/// Try to decode one frame from the front of `buf`.
///
/// Returns the payload and the number of bytes consumed, or `None` when
/// `buf` does not yet hold a whole frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, StoreError> {
    let colon = match buf.iter().position(|&b| b == b':') {
        Some(p) => p,
        None => {
            if buf.len() > 20 {
                return Err(StoreError::Protocol("missing netstring length".into()));
            }
            return Ok(None);
        }
    };

    let len_str = std::str::from_utf8(&buf[..colon])
        .map_err(|_| StoreError::Protocol("bad netstring length".into()))?;
    if len_str.is_empty() || len_str.len() > 1 && len_str.starts_with('0') {
        return Err(StoreError::Protocol("bad netstring length".into()));
    }
    let len: usize = len_str
        .parse()
        .map_err(|_| StoreError::Protocol("bad netstring length".into()))?;
    if len > MAX_FRAME {
        return Err(StoreError::Protocol("frame too large".into()));
    }

    let total = colon + 1 + len + 1;
    if buf.len() < total {
        return Ok(None);
    }
    if buf[colon + 1 + len] != b',' {
        return Err(StoreError::Protocol("missing netstring terminator".into()));
    }

    Ok(Some((buf[colon + 1..colon + 1 + len].to_vec(), total)))
}

/// Encode `key=value` records into a payload.
pub fn encode_kv(pairs: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value);
    }
    out
}

/// Decode a payload into its `key=value` records, preserving order.
pub fn decode_kv(payload: &[u8]) -> Result<OrderedMap<Vec<u8>>, StoreError> {
    let mut map = OrderedMap::new();
    for line in payload.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let eq = line
            .iter()
            .position(|&b| b == b'=')
            .ok_or_else(|| StoreError::Protocol("record without '='".into()))?;
        let key = std::str::from_utf8(&line[..eq])
            .map_err(|_| StoreError::Protocol("non-ASCII record key".into()))?;
        map.set(key, line[eq + 1..].to_vec());
    }
    Ok(map)
}

/// A request from a store client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Enter (possibly creating) a store; with `indexed`, also append an
    /// index record under `name`.
    Enter {
        /// Explicit store id; `None` generates one.
        id: Option<String>,
        /// Index display name; defaults to the id.
        name: Option<String>,
        /// Indexing timestamp; presence requests indexing.
        indexed: Option<i64>,
    },
    /// Open a file inside the entered store.
    Open {
        /// Entry name, relative to the store.
        path: String,
        /// Raw `O_*` flags.
        flags: i32,
    },
    /// Rename an entry inside the entered store.
    Rename {
        /// Source entry name.
        from: String,
        /// Destination entry name.
        to: String,
    },
    /// Ask for a read-only descriptor of the index file.
    Index,
    /// List stores, or the contents of one store.
    List {
        /// Store to list; `None` lists all store ids.
        store_id: Option<String>,
        /// Optional regex filter on names.
        must_match: Option<String>,
    },
}

impl Request {
    /// Encode the request into a frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut pairs: Vec<(&str, Vec<u8>)> = Vec::new();
        match self {
            Request::Enter { id, name, indexed } => {
                pairs.push(("action", b"enter".to_vec()));
                if let Some(id) = id {
                    pairs.push(("id", id.clone().into_bytes()));
                }
                if let Some(name) = name {
                    pairs.push(("name", name.clone().into_bytes()));
                }
                if let Some(ts) = indexed {
                    pairs.push(("indexed", ts.to_string().into_bytes()));
                }
            }
            Request::Open { path, flags } => {
                pairs.push(("action", b"open".to_vec()));
                pairs.push(("path", path.clone().into_bytes()));
                pairs.push(("flags", flags.to_string().into_bytes()));
            }
            Request::Rename { from, to } => {
                pairs.push(("action", b"rename".to_vec()));
                pairs.push(("from", from.clone().into_bytes()));
                pairs.push(("to", to.clone().into_bytes()));
            }
            Request::Index => pairs.push(("action", b"index".to_vec())),
            Request::List {
                store_id,
                must_match,
            } => {
                pairs.push(("action", b"list".to_vec()));
                if let Some(id) = store_id {
                    pairs.push(("id", id.clone().into_bytes()));
                }
                if let Some(re) = must_match {
                    pairs.push(("must_match", re.clone().into_bytes()));
                }
            }
        }

        let borrowed: Vec<(&str, &[u8])> =
            pairs.iter().map(|(k, v)| (*k, v.as_slice())).collect();
        encode_kv(&borrowed)
    }

    /// Decode a request from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self, StoreError> {
        let map = decode_kv(payload)?;
        let text = |key: &str| -> Result<Option<String>, StoreError> {
            match map.get(key) {
                None => Ok(None),
                Some(v) => Ok(Some(
                    String::from_utf8(v.clone())
                        .map_err(|_| StoreError::Protocol(format!("non-UTF-8 {key}")))?,
                )),
            }
        };

        let action = text("action")?
            .ok_or_else(|| StoreError::Protocol("missing 'action' field".into()))?;
        match action.as_str() {
            "enter" => Ok(Request::Enter {
                id: text("id")?,
                name: text("name")?,
                indexed: text("indexed")?
                    .map(|s| {
                        s.parse()
                            .map_err(|_| StoreError::Protocol("bad 'indexed' field".into()))
                    })
                    .transpose()?,
            }),
            "open" => Ok(Request::Open {
                path: text("path")?
                    .ok_or_else(|| StoreError::Protocol("missing 'path' field".into()))?,
                flags: text("flags")?
                    .ok_or_else(|| StoreError::Protocol("missing 'flags' field".into()))?
                    .parse()
                    .map_err(|_| StoreError::Protocol("bad 'flags' field".into()))?,
            }),
            "rename" => Ok(Request::Rename {
                from: text("from")?
                    .ok_or_else(|| StoreError::Protocol("missing 'from' field".into()))?,
                to: text("to")?
                    .ok_or_else(|| StoreError::Protocol("missing 'to' field".into()))?,
            }),
            "index" => Ok(Request::Index),
            "list" => Ok(Request::List {
                store_id: text("id")?,
                must_match: text("must_match")?,
            }),
            other => Err(StoreError::Protocol(format!("unknown action {other:?}"))),
        }
    }
}

/// A response from the store daemon.
///
/// `Open` and `Index` requests are answered with an [`Response::Ok`] or
/// [`Response::Errno`] frame whose send also carries the descriptor as
/// ancillary data when the open succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success, with an optional message (the store id for `enter`).
    Ok {
        /// Message payload.
        msg: Option<String>,
    },
    /// Request-level failure with a diagnostic.
    Err {
        /// Human-readable error.
        errmsg: String,
    },
    /// An open failed with this errno; no descriptor accompanies the
    /// frame.
    Errno {
        /// The `errno` value from the failed syscall.
        errno: i32,
    },
    /// Listing results: NUL-separated records.
    List {
        /// `name\0size\0` or `id\0` records.
        entries: Vec<u8>,
    },
}

impl Response {
    /// Encode the response into a frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let pairs: Vec<(&str, &[u8])> = match self {
            Response::Ok { msg } => match msg {
                Some(m) => vec![("status", b"ok".as_slice()), ("msg", m.as_bytes())],
                None => vec![("status", b"ok".as_slice())],
            },
            Response::Err { errmsg } => vec![
                ("status", b"err".as_slice()),
                ("errmsg", errmsg.as_bytes()),
            ],
            Response::Errno { errno } => {
                return encode_kv(&[
                    ("status", b"errno".as_slice()),
                    ("errno", errno.to_string().as_bytes()),
                ]);
            }
            Response::List { entries } => vec![
                ("status", b"list".as_slice()),
                ("entries", entries.as_slice()),
            ],
        };
        encode_kv(&pairs)
    }

    /// Decode a response from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self, StoreError> {
        let map = decode_kv(payload)?;
        let status = map
            .get("status")
            .ok_or_else(|| StoreError::Protocol("missing 'status' field".into()))?;

        match status.as_slice() {
            b"ok" => Ok(Response::Ok {
                msg: map
                    .get("msg")
                    .map(|v| String::from_utf8_lossy(v).into_owned()),
            }),
            b"err" => Ok(Response::Err {
                errmsg: map
                    .get("errmsg")
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default(),
            }),
            b"errno" => Ok(Response::Errno {
                errno: map
                    .get("errno")
                    .and_then(|v| std::str::from_utf8(v).ok())
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| StoreError::Protocol("bad 'errno' field".into()))?,
            }),
            b"list" => Ok(Response::List {
                entries: map.get("entries").cloned().unwrap_or_default(),
            }),
            _ => Err(StoreError::Protocol("unknown status".into())),
        }
    }
}
