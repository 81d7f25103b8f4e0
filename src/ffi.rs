//! A `-1`-on-failure, sentinel-returning shim over [`crate::mount::Filesystem`],
//! preserving the historical mount/umount/open/read/write calling
//! convention for any caller (a shell, a grading harness) that wants that
//! shape instead of `Result`. Internal and idiomatic Rust callers should
//! use `Filesystem` directly; this module exists purely for compatibility.
//!
//! This shim only supports one mounted filesystem at a time (there's
//! exactly one global slot), matching the single-mount calling convention
//! it's emulating. Anything wanting more than one mounted filesystem
//! should use `Filesystem` directly instead.

use std::sync::Mutex;

use crate::block::FileBlockDevice;
use crate::error::FsError;
use crate::mount::Filesystem;

static MOUNTED: Mutex<Option<Filesystem<FileBlockDevice>>> = Mutex::new(None);

fn log_and_sentinel(err: FsError) -> i32 {
    log::warn!("{}", err);
    -1
}

pub fn mount(disk_name: &str) -> i32 {
    let mut slot = MOUNTED.lock().unwrap();
    if slot.is_some() {
        return log_and_sentinel(FsError::AlreadyMounted);
    }
    let device = match FileBlockDevice::open(disk_name, crate::types::BLOCK_SIZE_DEFAULT) {
        Ok(d) => d,
        Err(e) => return log_and_sentinel(FsError::DiskOpen(e)),
    };
    match Filesystem::mount(device) {
        Ok(fs) => {
            *slot = Some(fs);
            0
        }
        Err(e) => log_and_sentinel(e),
    }
}

pub fn umount() -> i32 {
    let mut slot = MOUNTED.lock().unwrap();
    match slot.take() {
        None => log_and_sentinel(FsError::NotMounted),
        Some(fs) => match fs.umount() {
            Ok(()) => 0,
            Err((fs, e)) => {
                *slot = Some(fs);
                log_and_sentinel(e)
            }
        },
    }
}

pub fn info() -> i32 {
    with_mounted(|fs| {
        fs.info();
        Ok(())
    })
}

pub fn create(name: &str) -> i32 {
    with_mounted(|fs| fs.create(name))
}

pub fn delete(name: &str) -> i32 {
    with_mounted(|fs| fs.delete(name))
}

pub fn ls() -> i32 {
    with_mounted(|fs| {
        fs.ls();
        Ok(())
    })
}

pub fn open(name: &str) -> isize {
    with_mounted_val(|fs| fs.open(name)).map(|id| id as isize).unwrap_or(-1)
}

pub fn close(fd: usize) -> i32 {
    with_mounted(|fs| fs.close(fd))
}

pub fn stat(fd: usize) -> isize {
    with_mounted_val(|fs| fs.stat(fd)).map(|sz| sz as isize).unwrap_or(-1)
}

pub fn lseek(fd: usize, offset: u64) -> i32 {
    with_mounted(|fs| fs.lseek(fd, offset))
}

pub fn write(fd: usize, buf: &[u8]) -> isize {
    with_mounted_val(|fs| fs.write(fd, buf)).map(|n| n as isize).unwrap_or(-1)
}

pub fn read(fd: usize, buf: &mut [u8]) -> isize {
    with_mounted_val(|fs| fs.read(fd, buf)).map(|n| n as isize).unwrap_or(-1)
}

fn with_mounted<F: FnOnce(&mut Filesystem<FileBlockDevice>) -> crate::error::Result<()>>(f: F) -> i32 {
    let mut slot = MOUNTED.lock().unwrap();
    match slot.as_mut() {
        None => log_and_sentinel(FsError::NotMounted),
        Some(fs) => match f(fs) {
            Ok(()) => 0,
            Err(e) => log_and_sentinel(e),
        },
    }
}

fn with_mounted_val<T, F: FnOnce(&mut Filesystem<FileBlockDevice>) -> crate::error::Result<T>>(
    f: F,
) -> Option<T> {
    let mut slot = MOUNTED.lock().unwrap();
    match slot.as_mut() {
        None => {
            log_and_sentinel(FsError::NotMounted);
            None
        }
        Some(fs) => match f(fs) {
            Ok(v) => Some(v),
            Err(e) => {
                log_and_sentinel(e);
                None
            }
        },
    }
}
