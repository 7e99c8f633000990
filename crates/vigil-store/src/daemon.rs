// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `vigil-stored` service loop.
//!
//! Single-threaded: a current-thread reactor accepts clients on a
//! UNIX-domain socket and serves each from a local task. Handler
//! invocations within one client are totally ordered; ordering across
//! clients follows reactor readiness. Protocol violations produce a
//! structured error response and drop the connection; operational
//! failures (a missing file, a failed rename) are reported in-band and
//! the connection continues.

use std::cell::RefCell;
use std::fs::File;
use std::future::Future;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::Interest;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::fdpass;
use crate::id::IdGen;
use crate::index::{IndexEntry, IndexReader, IndexWriter};
use crate::proto::{self, Request, Response};
use crate::store::{Store, StoreHandle};

const INDEX_FILE: &str = "INDEX";

#[derive(Debug)]
struct Shared {
    store: Store,
    index: RefCell<IndexWriter>,
    idgen: RefCell<IdGen>,
}

/// The store daemon: a bound socket plus the store root it serves.
#[derive(Debug)]
pub struct Daemon {
    listener: UnixListener,
    socket_path: PathBuf,
    shared: Rc<Shared>,
}

impl Daemon {
    /// Create the store root and index under `base` and bind `socket`.
    ///
    /// A stale socket file from an earlier run is removed before binding;
    /// failure to bind is fatal to the caller.
    pub fn bind(socket: &Path, base: &Path) -> Result<Self, StoreError> {
        let store = Store::open_base(base.join("store"))?;
        let index = IndexWriter::open(&store.base().join(INDEX_FILE))?;

        match std::fs::remove_file(socket) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(socket)?;
        info!(socket = %socket.display(), base = %base.display(), "vigil-stored listening");

        Ok(Self {
            listener,
            socket_path: socket.to_path_buf(),
            shared: Rc::new(Shared {
                store,
                index: RefCell::new(index),
                idgen: RefCell::new(IdGen::new()),
            }),
        })
    }

    /// Accept and serve clients until `shutdown` completes.
    ///
    /// Must run inside a [`tokio::task::LocalSet`]; every client is a
    /// local task on the same thread.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), StoreError> {
        tokio::pin!(shutdown);
        let mut client_seq: u64 = 0;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, _addr) = accepted?;
                    client_seq += 1;
                    let shared = Rc::clone(&self.shared);
                    let client = client_seq;
                    tokio::task::spawn_local(async move {
                        debug!(client, "connected");
                        if let Err(e) = serve_client(stream, shared, client).await {
                            warn!(client, error = %e, "client failed");
                        }
                        debug!(client, "done");
                    });
                }
                _ = &mut shutdown => break,
            }
        }

        info!("shutting down");
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Read the next whole frame; `None` on a clean EOF between frames.
    async fn next(&mut self, stream: &mut UnixStream) -> Result<Option<Vec<u8>>, StoreError> {
        loop {
            if let Some((payload, used)) = proto::decode_frame(&self.buf)? {
                self.buf.drain(..used);
                return Ok(Some(payload));
            }

            let mut tmp = [0u8; 4096];
            let n = stream.read(&mut tmp).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(StoreError::Protocol("eof inside frame".into()));
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }
}

async fn send_response(stream: &mut UnixStream, resp: &Response) -> Result<(), StoreError> {
    let frame = proto::encode_frame(&resp.encode());
    stream.write_all(&frame).await?;
    Ok(())
}

/// Send a response frame and its descriptor in one `sendmsg`.
async fn send_response_with_fd(
    stream: &UnixStream,
    resp: &Response,
    fd: Option<&File>,
) -> Result<(), StoreError> {
    let frame = proto::encode_frame(&resp.encode());
    let raw = fd.map(|f| f.as_raw_fd());

    loop {
        stream.writable().await?;
        match stream.try_io(Interest::WRITABLE, || {
            fdpass::send_with_fd(stream.as_raw_fd(), &frame, raw)
        }) {
            Ok(n) if n == frame.len() => return Ok(()),
            Ok(_) => return Err(StoreError::Protocol("short descriptor send".into())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

async fn serve_client(
    mut stream: UnixStream,
    shared: Rc<Shared>,
    client: u64,
) -> Result<(), StoreError> {
    let mut frames = FrameReader::new();
    let mut entered: Option<StoreHandle> = None;

    loop {
        let payload = match frames.next(&mut stream).await {
            Ok(Some(p)) => p,
            Ok(None) => return Ok(()),
            Err(e) => {
                // Malformed framing: nothing sensible to answer.
                return Err(e);
            }
        };

        let request = match Request::decode(&payload) {
            Ok(r) => r,
            Err(e) => {
                error!(client, error = %e, "bad request");
                let resp = Response::Err {
                    errmsg: e.to_string(),
                };
                send_response(&mut stream, &resp).await?;
                return Ok(());
            }
        };

        match request {
            Request::Enter { id, name, indexed } => {
                let result = match &id {
                    Some(id) => shared.store.enter(id),
                    None => shared.store.create(&mut shared.idgen.borrow_mut()),
                };

                let handle = match result {
                    Ok(h) => h,
                    Err(e) => {
                        error!(client, error = %e, "enter failed");
                        let resp = Response::Err {
                            errmsg: "unable to enter store".into(),
                        };
                        send_response(&mut stream, &resp).await?;
                        return Ok(());
                    }
                };

                if let Some(ts) = indexed {
                    let entry = IndexEntry {
                        id: handle.id().to_string(),
                        name: name.unwrap_or_else(|| handle.id().to_string()),
                        indexed: ts,
                    };
                    if let Err(e) = shared.index.borrow_mut().put(&entry) {
                        error!(client, id = handle.id(), error = %e, "index append failed");
                    } else {
                        info!(client, id = handle.id(), name = %entry.name, "indexed store");
                    }
                }

                info!(client, id = handle.id(), "entered store");
                let resp = Response::Ok {
                    msg: Some(handle.id().to_string()),
                };
                send_response(&mut stream, &resp).await?;
                entered = Some(handle);
            }

            Request::Open { path, flags } => {
                let Some(handle) = entered.as_ref() else {
                    let resp = Response::Err {
                        errmsg: "open before enter".into(),
                    };
                    send_response(&mut stream, &resp).await?;
                    return Ok(());
                };

                match handle.open(&path, flags) {
                    Ok(file) => {
                        info!(client, id = handle.id(), path = %path, "opened");
                        send_response_with_fd(&stream, &Response::Ok { msg: None }, Some(&file))
                            .await?;
                    }
                    Err(StoreError::Io(e)) => {
                        let errno = e.raw_os_error().unwrap_or(libc::EIO);
                        warn!(client, id = handle.id(), path = %path, %errno, "open failed");
                        send_response_with_fd(&stream, &Response::Errno { errno }, None).await?;
                    }
                    Err(_) => {
                        warn!(client, id = handle.id(), "invalid open path");
                        send_response_with_fd(
                            &stream,
                            &Response::Errno {
                                errno: libc::EACCES,
                            },
                            None,
                        )
                        .await?;
                    }
                }
            }

            Request::Rename { from, to } => {
                let Some(handle) = entered.as_ref() else {
                    let resp = Response::Err {
                        errmsg: "rename before enter".into(),
                    };
                    send_response(&mut stream, &resp).await?;
                    return Ok(());
                };

                let resp = match handle.rename(&from, &to) {
                    Ok(()) => {
                        info!(client, id = handle.id(), %from, %to, "renamed");
                        Response::Ok { msg: None }
                    }
                    Err(e) => {
                        warn!(client, id = handle.id(), error = %e, "rename failed");
                        Response::Err {
                            errmsg: format!("rename: {e}"),
                        }
                    }
                };
                send_response(&mut stream, &resp).await?;
            }

            Request::Index => {
                let path = shared.store.base().join(INDEX_FILE);
                let file = match File::open(&path) {
                    Ok(f) => Ok(f),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        // Recreate a removed index, then retry the open.
                        let recreated = IndexWriter::open(&path);
                        if let Ok(w) = recreated {
                            *shared.index.borrow_mut() = w;
                        }
                        File::open(&path)
                    }
                    Err(e) => Err(e),
                };

                match file {
                    Ok(f) => {
                        // Refuse to hand out a torn index.
                        let reader = IndexReader::new(f.try_clone()?);
                        if reader.len().is_err() {
                            error!(client, "index corrupt");
                            return Err(StoreError::CorruptIndex);
                        }
                        debug!(client, "sent index fd");
                        send_response_with_fd(&stream, &Response::Ok { msg: None }, Some(&f))
                            .await?;
                    }
                    Err(e) => {
                        let errno = e.raw_os_error().unwrap_or(libc::EIO);
                        send_response_with_fd(&stream, &Response::Errno { errno }, None).await?;
                    }
                }
            }

            Request::List {
                store_id,
                must_match,
            } => {
                let filter = match must_match
                    .as_deref()
                    .map(regex::Regex::new)
                    .transpose()
                {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(client, error = %e, "bad list filter");
                        let resp = Response::Err {
                            errmsg: "failed to compile must-match pattern".into(),
                        };
                        send_response(&mut stream, &resp).await?;
                        continue;
                    }
                };

                let resp = match &store_id {
                    Some(id) => match shared.store.list_contents(id, filter.as_ref()) {
                        Ok(entries) => {
                            info!(client, id = %id, "listed store");
                            Response::List { entries }
                        }
                        Err(e) => {
                            warn!(client, error = %e, "list failed");
                            Response::Err {
                                errmsg: e.to_string(),
                            }
                        }
                    },
                    None => {
                        info!(client, "listed stores");
                        Response::List {
                            entries: shared.store.list_ids(filter.as_ref()),
                        }
                    }
                };
                send_response(&mut stream, &resp).await?;
            }
        }
    }
}
