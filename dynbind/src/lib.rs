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

//! Call into native shared libraries that are only found and opened at runtime.
//!
//! A binding is declared by placing [`import`] on an `extern` block:
//!
//! ```ignore
//! use core::ffi::{c_char, c_int, c_ulong};
//!
//! #[dynbind::import(binding = Zlib, names = ["z", "zlib"], versions = [none, 1])]
//! extern "C" {
//!     pub fn zlibVersion() -> *const c_char;
//!     pub fn zlibCompileFlags() -> c_ulong;
//!     pub fn zError(code: c_int) -> *const c_char;
//! }
//!
//! let zlib = Zlib::new();
//! let version = unsafe { zlib.zlibVersion() }?;
//! ```
//!
//! `Zlib::new()` probes `libz.so`, `libz.so.1`, `libzlib.so` and `libzlib.so.1` (with the platform's
//! own conventions elsewhere) and keeps the first that loads. Each method resolves its symbol when first
//! called (or when the binding is opened, with `resolve = eager`), and returns a [`DispatchError`] rather
//! than calling through a missing symbol.
//!
//! Without the macro, the same pieces are available directly: a [`Binding`] over a [`Loader`],
//! [`Slot`]s typed by their [`Signature`], and [`Binding::call`] to dispatch through them.

#[cfg(feature = "macros")]
pub use dynbind_macros::import;

mod banner;
mod binding;
mod error;
pub mod library;
pub mod loader;
pub mod naming;
mod signature;
mod slot;
pub mod version;

pub use banner::Banner;
pub use binding::{Binding, Config};
pub use error::{DispatchError, LoadError};
pub use library::{Candidates, LibraryHandle};
pub use loader::{LoadMode, Loader, SymbolAddress, SystemLoader};
pub use naming::{Platform, Version};
pub use signature::Signature;
pub use slot::{Resolution, Slot, SlotState, SymbolTable};
