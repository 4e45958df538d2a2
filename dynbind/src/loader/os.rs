//
// Copyright (c) 2023 ZettaScale Technology
//
// This program and the accompanying materials are made available under the
// terms of the Eclipse Public License 2.0 which is available at
// http://www.eclipse.org/legal/epl-2.0, or the Apache License, Version 2.0
// which is available at https://www.apache.org/licenses/LICENSE-2.0.
//
// SPDX-License-Identifier: EPL-2.0 OR Apache-2.0
//
// Contributors:
//   Pierre Avital, <pierre.avital@me.com>
//

//! The OS-specific corners of [`SystemLoader`](super::SystemLoader): probing and mapped-path introspection.

use std::path::PathBuf;

use crate::error::LoadError;

type Library = Option<libloading::Library>;

#[cfg(unix)]
pub(super) fn probe(file_name: &str) -> Result<(), LoadError> {
    use libloading::os::unix;
    // SAFETY: RTLD_NOLOAD never maps a new object, so no initialiser runs.
    match unsafe { unix::Library::open(Some(file_name), libc::RTLD_NOLOAD | libc::RTLD_LAZY) } {
        // dropping closes the handle, giving back the reference the probe took.
        Ok(library) => {
            drop(library);
            Ok(())
        }
        Err(_) => Err(LoadError::NotMapped {
            file_name: file_name.into(),
        }),
    }
}

#[cfg(windows)]
#[allow(unused_unsafe)]
pub(super) fn probe(file_name: &str) -> Result<(), LoadError> {
    use libloading::os::windows;
    // SAFETY: only looks the module up among those already loaded.
    match unsafe { windows::Library::open_already_loaded(file_name) } {
        Ok(library) => {
            drop(library);
            Ok(())
        }
        Err(_) => Err(LoadError::NotMapped {
            file_name: file_name.into(),
        }),
    }
}

#[cfg(not(any(unix, windows)))]
pub(super) fn probe(file_name: &str) -> Result<(), LoadError> {
    Err(LoadError::Other {
        file_name: file_name.into(),
        reason: "probing loaded modules is not supported on this platform".into(),
    })
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub(super) fn mapped_path(library: &mut Library) -> Option<PathBuf> {
    use core::ffi::{c_char, c_int, c_void, CStr};
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    #[repr(C)]
    #[allow(dead_code)]
    struct LinkMap {
        l_addr: usize,
        l_name: *const c_char,
        l_ld: *mut c_void,
        l_next: *mut LinkMap,
        l_prev: *mut LinkMap,
    }
    const RTLD_DI_LINKMAP: c_int = 2;
    extern "C" {
        fn dlinfo(handle: *mut c_void, request: c_int, info: *mut c_void) -> c_int;
    }

    let raw = libloading::os::unix::Library::from(library.take()?).into_raw();
    let mut map: *mut LinkMap = core::ptr::null_mut();
    // SAFETY: `raw` is a live handle from dlopen, and RTLD_DI_LINKMAP writes a single pointer.
    let path = unsafe {
        if dlinfo(raw, RTLD_DI_LINKMAP, (&mut map as *mut *mut LinkMap).cast()) == 0
            && !map.is_null()
            && !(*map).l_name.is_null()
        {
            let name = CStr::from_ptr((*map).l_name).to_bytes();
            (!name.is_empty()).then(|| PathBuf::from(OsStr::from_bytes(name)))
        } else {
            None
        }
    };
    // SAFETY: `raw` came out of `into_raw` above and hasn't been closed.
    *library = Some(unsafe { libloading::os::unix::Library::from_raw(raw) }.into());
    path
}

#[cfg(target_vendor = "apple")]
pub(super) fn mapped_path(library: &mut Library) -> Option<PathBuf> {
    use core::ffi::CStr;
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    let raw = libloading::os::unix::Library::from(library.take()?).into_raw();
    let mut path = None;
    // SAFETY: dyld's image list is append-only while we hold a reference on `raw`.
    unsafe {
        for index in 0..libc::_dyld_image_count() {
            let name = libc::_dyld_get_image_name(index);
            if name.is_null() {
                continue;
            }
            let handle = libc::dlopen(name, libc::RTLD_NOLOAD | libc::RTLD_LAZY);
            if handle.is_null() {
                continue;
            }
            libc::dlclose(handle);
            // dyld tags handles in their low bit depending on the open mode.
            if (handle as usize) & !1 == (raw as usize) & !1 {
                path = Some(PathBuf::from(OsStr::from_bytes(
                    CStr::from_ptr(name).to_bytes(),
                )));
                break;
            }
        }
    }
    // SAFETY: `raw` came out of `into_raw` above and hasn't been closed.
    *library = Some(unsafe { libloading::os::unix::Library::from_raw(raw) }.into());
    path
}

#[cfg(windows)]
pub(super) fn mapped_path(library: &mut Library) -> Option<PathBuf> {
    use std::{ffi::OsString, os::windows::ffi::OsStringExt};

    #[link(name = "kernel32")]
    extern "system" {
        fn GetModuleFileNameW(module: isize, file_name: *mut u16, size: u32) -> u32;
    }

    let raw = libloading::os::windows::Library::from(library.take()?).into_raw();
    let mut buffer = vec![0u16; 260];
    let path = loop {
        // SAFETY: `buffer` holds `buffer.len()` writable u16s.
        let len =
            unsafe { GetModuleFileNameW(raw as isize, buffer.as_mut_ptr(), buffer.len() as u32) }
                as usize;
        if len == 0 {
            break None;
        }
        if len < buffer.len() {
            break Some(PathBuf::from(OsString::from_wide(&buffer[..len])));
        }
        if buffer.len() >= 32 * 1024 {
            break None;
        }
        buffer.resize(buffer.len() * 2, 0);
    };
    // SAFETY: `raw` came out of `into_raw` above and hasn't been closed.
    *library = Some(unsafe { libloading::os::windows::Library::from_raw(raw) }.into());
    path
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "freebsd",
    target_vendor = "apple",
    windows
)))]
pub(super) fn mapped_path(_: &mut Library) -> Option<PathBuf> {
    None
}
