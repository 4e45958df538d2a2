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

//! The portable loader: one contract over the OS's "open a library / find a symbol / close it" primitives.

use core::{ffi::c_void, ptr::NonNull};
use std::path::PathBuf;

use crate::{
    error::LoadError,
    naming::{self, Platform, Version},
};

mod os;

/// The address of a symbol found in a loaded library.
pub type SymbolAddress = NonNull<c_void>;

/// How [`Loader::load`] should treat the library.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Open the library, taking a reference on it until [`Loader::unload`].
    #[default]
    Full,
    /// Only check whether the library is already mapped into the process.
    ///
    /// Never maps anything, and leaves the OS reference count and the loader's state untouched.
    Probe,
}

/// A handle on at most one OS-loaded library.
///
/// Failures are reported through return values: implementations must never panic or abort.
pub trait Loader {
    /// Sets the file to open to the platform's file name for `name` at `version`.
    fn set_file_name_and_version(&mut self, name: &str, version: Version);
    /// Sets the file to open to the platform's file name for `name`, without version.
    fn set_file_name(&mut self, name: &str) {
        self.set_file_name_and_version(name, Version::None)
    }
    /// The candidate file name computed by the last `set_file_name*` call.
    fn file_name(&self) -> &str;
    /// Opens [`Self::file_name`]. Loading the file that is already loaded succeeds; loading another file
    /// unloads the current one first.
    fn load(&mut self, mode: LoadMode) -> Result<(), LoadError>;
    /// Closes the library. Unloading an unloaded loader succeeds.
    fn unload(&mut self) -> Result<(), LoadError>;
    fn is_loaded(&self) -> bool;
    /// Looks `symbol` up verbatim.
    fn lookup(&self, symbol: &str) -> Option<SymbolAddress>;
    /// The path of the file the OS actually mapped, once loaded.
    fn path(&self) -> Option<PathBuf>;

    /// Looks `symbol` up, falling back to `_symbol` for objects built with the legacy underscore-prefixed C ABI.
    fn resolve(&self, symbol: &str) -> Option<SymbolAddress> {
        if let Some(address) = self.lookup(symbol) {
            return Some(address);
        }
        let legacy = format!("_{symbol}");
        let address = self.lookup(&legacy);
        if address.is_some() {
            tracing::trace!(symbol, legacy, "resolved through legacy name");
        }
        address
    }
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    fn set_file_name_and_version(&mut self, name: &str, version: Version) {
        (**self).set_file_name_and_version(name, version)
    }
    fn set_file_name(&mut self, name: &str) {
        (**self).set_file_name(name)
    }
    fn file_name(&self) -> &str {
        (**self).file_name()
    }
    fn load(&mut self, mode: LoadMode) -> Result<(), LoadError> {
        (**self).load(mode)
    }
    fn unload(&mut self) -> Result<(), LoadError> {
        (**self).unload()
    }
    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }
    fn lookup(&self, symbol: &str) -> Option<SymbolAddress> {
        (**self).lookup(symbol)
    }
    fn path(&self) -> Option<PathBuf> {
        (**self).path()
    }
    fn resolve(&self, symbol: &str) -> Option<SymbolAddress> {
        (**self).resolve(symbol)
    }
}

/// The [`Loader`] backed by the OS's dynamic loader, through [`libloading`].
#[derive(Debug)]
pub struct SystemLoader {
    platform: Platform,
    file_name: String,
    /// The file name `library` was opened from.
    opened: String,
    library: Option<libloading::Library>,
    mapped: Option<PathBuf>,
}
impl SystemLoader {
    pub const fn new() -> Self {
        Self::with_platform(Platform::current())
    }
    /// A loader that names files after `platform`'s convention rather than the host's.
    pub const fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            file_name: String::new(),
            opened: String::new(),
            library: None,
            mapped: None,
        }
    }
    pub const fn platform(&self) -> Platform {
        self.platform
    }
}
impl Default for SystemLoader {
    fn default() -> Self {
        Self::new()
    }
}
impl Loader for SystemLoader {
    fn set_file_name_and_version(&mut self, name: &str, version: Version) {
        self.file_name = naming::file_name_with_version(self.platform, name, version);
    }
    fn file_name(&self) -> &str {
        &self.file_name
    }
    fn load(&mut self, mode: LoadMode) -> Result<(), LoadError> {
        if self.file_name.is_empty() {
            return Err(LoadError::NoFileName);
        }
        match mode {
            LoadMode::Probe => os::probe(&self.file_name),
            LoadMode::Full if self.library.is_some() && self.opened == self.file_name => Ok(()),
            LoadMode::Full => {
                if self.library.is_some() {
                    tracing::debug!(from = self.opened, to = self.file_name, "switching library");
                    self.unload()?;
                }
                // SAFETY: running the library's initialisers is the point of loading it.
                let library = unsafe { libloading::Library::new(&self.file_name) }.map_err(
                    |source| LoadError::Open {
                        file_name: self.file_name.clone(),
                        source,
                    },
                )?;
                self.library = Some(library);
                self.opened = self.file_name.clone();
                let mapped = os::mapped_path(&mut self.library)
                    .unwrap_or_else(|| PathBuf::from(&self.file_name));
                self.mapped = Some(std::fs::canonicalize(&mapped).unwrap_or(mapped));
                Ok(())
            }
        }
    }
    fn unload(&mut self) -> Result<(), LoadError> {
        self.mapped = None;
        let file_name = core::mem::take(&mut self.opened);
        match self.library.take() {
            None => Ok(()),
            Some(library) => library
                .close()
                .map_err(|source| LoadError::Close { file_name, source }),
        }
    }
    fn is_loaded(&self) -> bool {
        self.library.is_some()
    }
    fn lookup(&self, symbol: &str) -> Option<SymbolAddress> {
        let library = self.library.as_ref()?;
        // SAFETY: the address is only read here; callers type it through `Signature`.
        let address = unsafe { library.get::<*mut c_void>(symbol.as_bytes()) }.ok()?;
        NonNull::new(*address)
    }
    fn path(&self) -> Option<PathBuf> {
        self.mapped.clone()
    }
}
