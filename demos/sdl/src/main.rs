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

//! Opens an SDL 1.2 window for a few seconds, with SDL loaded at runtime.
//!
//! Probes `SDL`, `SDL32`, `sdl` then `SDL-1.2`, each under no version, then 2, then 1.

use std::{
    ffi::{c_char, c_int, c_void},
    process::ExitCode,
    time::{Duration, Instant},
};

use tracing_subscriber::EnvFilter;

#[dynbind::import(
    binding = Sdl,
    names = ["SDL", "SDL32", "sdl", "SDL-1.2"],
    versions = [none, 2, 1, end],
    resolve = eager
)]
extern "C" {
    fn SDL_Init(flags: u32) -> c_int;
    fn SDL_WM_SetCaption(title: *const c_char, icon: *const c_char);
    fn SDL_PollEvent(event: *mut c_void) -> c_int;
    fn SDL_SetVideoMode(width: c_int, height: c_int, bpp: c_int, flags: u32) -> *mut c_void;
    fn SDL_Quit();
}

const SDL_INIT_VIDEO: u32 = 0x20;
const SDL_QUIT: u8 = 12;

fn run(sdl: &Sdl) -> Result<(), dynbind::DispatchError> {
    // SAFETY: SDL is initialised before any other call, and quit once afterwards.
    unsafe {
        if sdl.SDL_Init(SDL_INIT_VIDEO)? != 0 {
            tracing::error!("SDL_Init failed");
            return Ok(());
        }
        if sdl.SDL_SetVideoMode(640, 480, 0, 0)?.is_null() {
            tracing::error!("SDL_SetVideoMode failed");
        } else {
            let title = b"dynbind\0";
            sdl.SDL_WM_SetCaption(title.as_ptr().cast(), title.as_ptr().cast())?;
            // large enough for any `SDL_Event`
            let mut event = [0u64; 8];
            let start = Instant::now();
            'events: while start.elapsed() < Duration::from_secs(3) {
                while sdl.SDL_PollEvent(event.as_mut_ptr().cast())? != 0 {
                    if event[0].to_ne_bytes()[0] == SDL_QUIT {
                        break 'events;
                    }
                }
                std::thread::sleep(Duration::from_millis(16));
            }
        }
        sdl.SDL_Quit()
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let sdl = Sdl::new();
    if !sdl.is_loaded() {
        tracing::error!(tried = ?sdl.binding().library().tried(), "SDL not found");
        return ExitCode::FAILURE;
    }
    let symbols = sdl.symbols();
    for (symbol, state) in [
        (symbols.SDL_Init.symbol(), symbols.SDL_Init.state()),
        (symbols.SDL_SetVideoMode.symbol(), symbols.SDL_SetVideoMode.state()),
        (symbols.SDL_WM_SetCaption.symbol(), symbols.SDL_WM_SetCaption.state()),
    ] {
        tracing::debug!(symbol, ?state);
    }
    match run(&sdl) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error);
            ExitCode::FAILURE
        }
    }
}
