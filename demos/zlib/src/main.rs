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

//! Prints what the zlib found at runtime says about itself, without linking against it.
//!
//! `RUST_LOG=debug` shows every candidate tried; `DYNBIND_ZLIB=/path/to/libz.so` tries that file first.

use std::{
    ffi::{c_char, c_int, c_ulong, CStr},
    process::ExitCode,
};

use tracing_subscriber::EnvFilter;

#[dynbind::import(
    binding = Zlib,
    names = ["z", "zlib", "zlib1"],
    versions = [none, 1],
    env = "DYNBIND_ZLIB"
)]
extern "C" {
    pub fn zlibVersion() -> *const c_char;
    pub fn zlibCompileFlags() -> c_ulong;
    #[link_name = "zError"]
    pub fn error_text(code: c_int) -> *const c_char;
}

/// # Safety
/// `text` must be null or point to a nul-terminated string that outlives the returned one.
unsafe fn text<'a>(text: *const c_char) -> Option<&'a str> {
    if text.is_null() {
        return None;
    }
    CStr::from_ptr(text).to_str().ok()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let zlib = Zlib::new();
    if !zlib.is_loaded() {
        tracing::error!(tried = ?zlib.binding().library().tried(), "zlib not found");
        return ExitCode::FAILURE;
    }
    tracing::info!(path = ?zlib.binding().library().path(), "zlib loaded");
    // SAFETY: these three functions take no pointers and return static strings.
    let result = unsafe {
        zlib.zlibVersion().map(|version| {
            println!("zlib version: {}", text(version).unwrap_or("?"));
        })
        .and_then(|()| zlib.zlibCompileFlags())
        .map(|flags| println!("zlib compile flags: {flags:#x}"))
        .and_then(|()| {
            for code in [-2, -3, -4, -5] {
                let message = zlib.error_text(code)?;
                println!("zError({code}): {}", text(message).unwrap_or("?"));
            }
            Ok(())
        })
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error);
            ExitCode::FAILURE
        }
    }
}
