// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! System call strategy
//!
//! The registry never calls into the kernel directly. Every delegated
//! operation goes through [`SysApi`], so interception shims can plug in
//! their captured "real" entry points and tests can substitute a fake
//! driver without touching process-wide function pointers.

use std::ffi::CString;
use std::io;
use std::os::fd::RawFd;

/// The system call surface the registry delegates to
pub trait SysApi {
    fn open(&mut self, path: &str, flags: i32, mode: u32) -> io::Result<RawFd>;
    fn close(&mut self, fd: RawFd) -> io::Result<()>;
    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize>;
    /// Perform an ioctl with `arg` as the argument memory
    ///
    /// The kernel may update `arg` in place; hooks inspect it afterwards.
    fn ioctl(&mut self, fd: RawFd, request: u32, arg: &mut [u8]) -> io::Result<i32>;
    /// Map `len` bytes of `fd` at `offset`, returning the address
    fn mmap(&mut self, fd: RawFd, len: usize, offset: u64) -> io::Result<usize>;
    fn munmap(&mut self, addr: usize, len: usize) -> io::Result<()>;

    /// Read `len` bytes of the intercepted application's memory
    ///
    /// Requests pass buffer contents and record arrays by pointer; the
    /// hooks resolve those pointers through this entry point. Returns
    /// `None` when the address space is not reachable, in which case the
    /// observation is skipped.
    fn read_user(&mut self, addr: usize, len: usize) -> Option<Vec<u8>> {
        let _ = (addr, len);
        None
    }
}

/// Pass-through implementation calling the real kernel via `libc`
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl Passthrough {
    fn errno() -> io::Error {
        io::Error::last_os_error()
    }
}

impl SysApi for Passthrough {
    fn open(&mut self, path: &str, flags: i32, mode: u32) -> io::Result<RawFd> {
        let path = CString::new(path).map_err(io::Error::other)?;
        match unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) } {
            -1 => Err(Self::errno()),
            fd => Ok(fd),
        }
    }

    fn close(&mut self, fd: RawFd) -> io::Result<()> {
        match unsafe { libc::close(fd) } {
            -1 => Err(Self::errno()),
            _ => Ok(()),
        }
    }

    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        match unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) } {
            -1 => Err(Self::errno()),
            n => Ok(n as usize),
        }
    }

    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        match unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) } {
            -1 => Err(Self::errno()),
            n => Ok(n as usize),
        }
    }

    fn ioctl(&mut self, fd: RawFd, request: u32, arg: &mut [u8]) -> io::Result<i32> {
        let argp = arg.as_mut_ptr();
        match unsafe { libc::ioctl(fd, request as libc::c_ulong, argp) } {
            -1 => Err(Self::errno()),
            ret => Ok(ret),
        }
    }

    fn mmap(&mut self, fd: RawFd, len: usize, offset: u64) -> io::Result<usize> {
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            Err(Self::errno())
        } else {
            Ok(addr as usize)
        }
    }

    fn munmap(&mut self, addr: usize, len: usize) -> io::Result<()> {
        match unsafe { libc::munmap(addr as *mut libc::c_void, len) } {
            -1 => Err(Self::errno()),
            _ => Ok(()),
        }
    }

    fn read_user(&mut self, addr: usize, len: usize) -> Option<Vec<u8>> {
        if addr == 0 {
            return None;
        }
        // In-process interposition shares the application's address space;
        // the range was just handed to the kernel by the application.
        let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
        Some(bytes.to_vec())
    }
}
