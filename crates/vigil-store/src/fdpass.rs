// SPDX-License-Identifier: MIT OR Apache-2.0
//! File descriptor passing over UNIX-domain sockets.
//!
//! Descriptors ride as `SCM_RIGHTS` ancillary data on the same `sendmsg`
//! that carries the response frame, so a receiver always gets the frame
//! and its descriptor together.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

/// Ancillary buffer sized for one descriptor; aligned for `cmsghdr`.
#[repr(C, align(8))]
struct CmsgBuf([u8; 64]);

impl CmsgBuf {
    fn new() -> Self {
        Self([0u8; 64])
    }

    fn space() -> usize {
        unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) as usize }
    }
}

/// Send `payload` on `sock`, attaching `fd` as ancillary data when
/// present.
pub fn send_with_fd(sock: RawFd, payload: &[u8], fd: Option<RawFd>) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr() as *mut libc::c_void,
        iov_len: payload.len(),
    };

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    let mut cmsg_buf = CmsgBuf::new();
    if let Some(fd) = fd {
        msg.msg_control = cmsg_buf.0.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = CmsgBuf::space() as _;

        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<RawFd>() as u32) as _;
            std::ptr::copy_nonoverlapping(
                &fd as *const RawFd as *const u8,
                libc::CMSG_DATA(cmsg),
                mem::size_of::<RawFd>(),
            );
        }
    }

    let n = unsafe { libc::sendmsg(sock, &msg, 0) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Receive up to `buf.len()` bytes from `sock`, collecting an attached
/// descriptor if one arrived.
pub fn recv_with_fd(sock: RawFd, buf: &mut [u8]) -> io::Result<(usize, Option<RawFd>)> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    let mut cmsg_buf = CmsgBuf::new();
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.0.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = CmsgBuf::space() as _;

    let n = unsafe { libc::recvmsg(sock, &mut msg, 0) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut fd = None;
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let mut raw: RawFd = -1;
                std::ptr::copy_nonoverlapping(
                    libc::CMSG_DATA(cmsg),
                    &mut raw as *mut RawFd as *mut u8,
                    mem::size_of::<RawFd>(),
                );
                if raw >= 0 {
                    fd = Some(raw);
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    Ok((n as usize, fd))
}
