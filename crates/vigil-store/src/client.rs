// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blocking client for the store daemon.

use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::error::StoreError;
use crate::fdpass;
use crate::proto::{self, Request, Response};

/// Synchronous connection to `vigil-stored`.
///
/// Used by tooling and tests; batch programs talk to the daemon through
/// this, one request at a time.
#[derive(Debug)]
pub struct StoreClient {
    stream: UnixStream,
    buf: Vec<u8>,
}

impl StoreClient {
    /// Connect to the daemon socket at `path`.
    pub fn connect(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            stream: UnixStream::connect(path)?,
            buf: Vec::new(),
        })
    }

    /// Enter a store; `id: None` creates a fresh one. Returns the id.
    ///
    /// With `indexed`, the daemon also appends an index record under
    /// `name` (defaulting to the id).
    pub fn enter(
        &mut self,
        id: Option<&str>,
        name: Option<&str>,
        indexed: Option<i64>,
    ) -> Result<String, StoreError> {
        let req = Request::Enter {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            indexed,
        };
        self.send(&req)?;
        match self.recv()? {
            Response::Ok { msg: Some(id) } => Ok(id),
            Response::Ok { msg: None } => {
                Err(StoreError::Protocol("enter response without id".into()))
            }
            Response::Err { errmsg } => Err(StoreError::Remote(errmsg)),
            _ => Err(StoreError::Protocol("unexpected enter response".into())),
        }
    }

    /// Open `path` in the entered store with raw `O_*` flags.
    pub fn open(&mut self, path: &str, flags: i32) -> Result<File, StoreError> {
        self.send(&Request::Open {
            path: path.to_string(),
            flags,
        })?;
        self.recv_file()
    }

    /// Rename `from` to `to` inside the entered store.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        self.send(&Request::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        match self.recv()? {
            Response::Ok { .. } => Ok(()),
            Response::Err { errmsg } => Err(StoreError::Remote(errmsg)),
            _ => Err(StoreError::Protocol("unexpected rename response".into())),
        }
    }

    /// Fetch a read-only descriptor of the store index.
    pub fn index(&mut self) -> Result<File, StoreError> {
        self.send(&Request::Index)?;
        self.recv_file()
    }

    /// List stores (`id\0` records) or one store's files
    /// (`name\0size\0` records).
    pub fn list(
        &mut self,
        store_id: Option<&str>,
        must_match: Option<&str>,
    ) -> Result<Vec<u8>, StoreError> {
        self.send(&Request::List {
            store_id: store_id.map(str::to_string),
            must_match: must_match.map(str::to_string),
        })?;
        match self.recv()? {
            Response::List { entries } => Ok(entries),
            Response::Err { errmsg } => Err(StoreError::Remote(errmsg)),
            _ => Err(StoreError::Protocol("unexpected list response".into())),
        }
    }

    fn send(&mut self, req: &Request) -> Result<(), StoreError> {
        let frame = proto::encode_frame(&req.encode());
        self.stream.write_all(&frame)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Response, StoreError> {
        loop {
            if let Some((payload, used)) = proto::decode_frame(&self.buf)? {
                self.buf.drain(..used);
                return Response::decode(&payload);
            }
            let mut tmp = [0u8; 4096];
            let n = self.stream.read(&mut tmp)?;
            if n == 0 {
                return Err(StoreError::Protocol("connection closed".into()));
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    /// Receive a frame that may carry a descriptor.
    fn recv_file(&mut self) -> Result<File, StoreError> {
        let mut fd = None;
        loop {
            if let Some((payload, used)) = proto::decode_frame(&self.buf)? {
                self.buf.drain(..used);
                return match Response::decode(&payload)? {
                    Response::Ok { .. } => {
                        let raw =
                            fd.ok_or_else(|| StoreError::Protocol("missing descriptor".into()))?;
                        // Safety: the descriptor was just received over
                        // SCM_RIGHTS and is owned by nothing else.
                        #[allow(unsafe_code)]
                        Ok(unsafe { File::from_raw_fd(raw) })
                    }
                    Response::Errno { errno } => {
                        if let Some(raw) = fd {
                            #[allow(unsafe_code)]
                            drop(unsafe { File::from_raw_fd(raw) });
                        }
                        Err(StoreError::Errno(errno))
                    }
                    Response::Err { errmsg } => Err(StoreError::Remote(errmsg)),
                    _ => Err(StoreError::Protocol("unexpected open response".into())),
                };
            }

            let mut tmp = [0u8; 4096];
            let (n, got_fd) = fdpass::recv_with_fd(self.stream.as_raw_fd(), &mut tmp)?;
            if n == 0 {
                return Err(StoreError::Protocol("connection closed".into()));
            }
            if got_fd.is_some() {
                fd = got_fd;
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }
}
