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

use crate::{
    banner::Banner,
    error::DispatchError,
    library::{Candidates, LibraryHandle},
    loader::{Loader, SystemLoader},
    signature::Signature,
    slot::{Resolution, Slot, SlotState, SymbolTable},
};

/// How a [`Binding`] finds its library and resolves its symbols.
#[derive(Debug, Clone)]
pub struct Config {
    pub candidates: Candidates,
    pub resolution: Resolution,
    /// Fired when the binding is opened. `None` keeps the binding quiet about the protocol version.
    pub banner: Option<&'static Banner>,
}
impl Config {
    /// Lazy resolution, announced through [`Banner::global`].
    pub fn new(candidates: Candidates) -> Self {
        Self {
            candidates,
            resolution: Resolution::default(),
            banner: Some(Banner::global()),
        }
    }
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
    pub fn eager(self) -> Self {
        self.resolution(Resolution::Eager)
    }
    pub fn lazy(self) -> Self {
        self.resolution(Resolution::Lazy)
    }
    pub fn banner(mut self, banner: Option<&'static Banner>) -> Self {
        self.banner = banner;
        self
    }
}

/// A library opened for runtime binding, and the policy its slots are resolved with.
///
/// The slots themselves live next to the binding (usually in a [`SymbolTable`] generated by
/// `#[dynbind::import]`), and are resolved against it through [`Binding::get`] or [`Binding::attach`].
#[derive(Debug)]
pub struct Binding<L: Loader = SystemLoader> {
    library: LibraryHandle<L>,
    resolution: Resolution,
}
impl<L: Loader> Binding<L> {
    /// Fires the configured banner, then opens the first loadable candidate.
    pub fn open(loader: L, config: Config) -> Self {
        let Config {
            candidates,
            resolution,
            banner,
        } = config;
        if let Some(banner) = banner {
            banner.fire();
        }
        Self {
            library: LibraryHandle::open(loader, candidates),
            resolution,
        }
    }
    pub fn library(&self) -> &LibraryHandle<L> {
        &self.library
    }
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
    pub fn is_loaded(&self) -> bool {
        self.library.is_loaded()
    }
    /// Resolves all of `symbols` now if the policy is [`Resolution::Eager`].
    pub fn attach<T: SymbolTable>(&self, symbols: &T) {
        if self.resolution == Resolution::Eager {
            symbols.resolve_all(&self.library);
        }
    }
    /// Resolves `slot` if needed, and returns its function.
    pub fn get<F: Signature>(&self, slot: &Slot<F>) -> Result<F, DispatchError> {
        let state = slot.resolve(&self.library);
        let symbol = slot.symbol();
        match (state, slot.get()) {
            (SlotState::Resolved, Some(f)) => Ok(f),
            (SlotState::NotLoaded, _) | (SlotState::Unresolved, _) => {
                Err(DispatchError::NotLoaded {
                    symbol,
                    tried: self.library.tried(),
                })
            }
            _ => Err(DispatchError::Missing {
                symbol,
                path: self.library.path().map(Into::into),
            }),
        }
    }
    /// Calls the function in `slot` with `args`, resolving it first if needed.
    ///
    /// # Safety
    /// Calls foreign code: the native function's own contract must be upheld.
    pub unsafe fn call<F: Signature>(
        &self,
        slot: &Slot<F>,
        args: F::Args,
    ) -> Result<F::Output, DispatchError> {
        let f = self.get(slot).map_err(|error| {
            tracing::warn!(%error, "call through an unresolved symbol");
            error
        })?;
        tracing::trace!(symbol = slot.symbol(), "call");
        Ok(f.invoke(args))
    }
    /// Resets `symbols`, reopens the library, and re-attaches `symbols` to it.
    pub fn reload<T: SymbolTable>(&mut self, symbols: &mut T) -> bool {
        symbols.reset_all();
        let loaded = self.library.reload();
        self.attach(symbols);
        loaded
    }
}
