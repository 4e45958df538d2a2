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

//! Per-symbol function pointer slots.

use core::{
    ffi::c_void,
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{AtomicPtr, AtomicU8, Ordering},
};

use crate::{
    library::LibraryHandle,
    loader::{Loader, SymbolAddress},
    signature::Signature,
};

/// When a binding's slots get resolved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Every slot is resolved as soon as the library is opened.
    Eager,
    /// Each slot is resolved on its first call.
    #[default]
    Lazy,
}

/// Where a [`Slot`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Resolution hasn't been attempted yet.
    Unresolved,
    /// The symbol was found: the slot holds a non-null address.
    Resolved,
    /// Resolution was attempted while the library wasn't loaded.
    NotLoaded,
    /// The library is loaded, but doesn't export the symbol.
    Missing,
}

const UNRESOLVED: u8 = 0;
const RESOLVED: u8 = 1;
const NOT_LOADED: u8 = 2;
const MISSING: u8 = 3;
const LOCKED: u8 = 4;

impl SlotState {
    const fn from_u8(state: u8) -> Self {
        match state {
            RESOLVED => SlotState::Resolved,
            NOT_LOADED => SlotState::NotLoaded,
            MISSING => SlotState::Missing,
            _ => SlotState::Unresolved,
        }
    }
}

/// The function pointer for one bound symbol, resolved at most once per load of its library.
///
/// Failed resolutions are remembered just like successful ones: a slot only goes back to
/// [`SlotState::Unresolved`] through [`Slot::reset`], which bindings call when they reload their library.
pub struct Slot<F> {
    symbol: &'static str,
    state: AtomicU8,
    address: AtomicPtr<c_void>,
    signature: PhantomData<F>,
}

impl<F> Slot<F> {
    /// A slot for `symbol`, typed as `F`.
    ///
    /// # Safety
    /// Every library this slot gets resolved against must export `symbol` as a function of signature `F`, or not at all.
    pub const unsafe fn new(symbol: &'static str) -> Self {
        Self {
            symbol,
            state: AtomicU8::new(UNRESOLVED),
            address: AtomicPtr::new(core::ptr::null_mut()),
            signature: PhantomData,
        }
    }
    pub const fn symbol(&self) -> &'static str {
        self.symbol
    }
    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }
    /// The resolved address, if any.
    pub fn address(&self) -> Option<SymbolAddress> {
        match self.state.load(Ordering::Acquire) {
            RESOLVED => NonNull::new(self.address.load(Ordering::Relaxed)),
            _ => None,
        }
    }
    /// Resolves the slot against `library` if it hasn't been yet, and returns its state.
    ///
    /// Concurrent callers wait for the first one, so the library is asked at most once.
    pub fn resolve<L: Loader>(&self, library: &LibraryHandle<L>) -> SlotState {
        loop {
            match self.state.load(Ordering::Acquire) {
                UNRESOLVED => {
                    if self
                        .state
                        .compare_exchange_weak(
                            UNRESOLVED,
                            LOCKED,
                            Ordering::Acquire,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        let unlock = Unlock(&self.state);
                        let state = self.lookup(library);
                        core::mem::forget(unlock);
                        self.state.store(state, Ordering::Release);
                        return SlotState::from_u8(state);
                    }
                }
                LOCKED => {}
                state => return SlotState::from_u8(state),
            }
            core::hint::spin_loop();
        }
    }
    fn lookup<L: Loader>(&self, library: &LibraryHandle<L>) -> u8 {
        let symbol = self.symbol;
        if !library.is_loaded() {
            tracing::debug!(symbol, "library not loaded");
            return NOT_LOADED;
        }
        match library.resolve(symbol) {
            Some(address) => {
                self.address.store(address.as_ptr(), Ordering::Relaxed);
                tracing::debug!(symbol, ?address, "resolved");
                RESOLVED
            }
            None => {
                tracing::debug!(symbol, library = ?library.path(), "symbol not found");
                MISSING
            }
        }
    }
    /// Forgets any previous resolution.
    pub fn reset(&mut self) {
        *self.state.get_mut() = UNRESOLVED;
        *self.address.get_mut() = core::ptr::null_mut();
    }
}
/// Puts a locked slot back to unresolved if its lookup unwinds.
struct Unlock<'a>(&'a AtomicU8);
impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        self.0.store(UNRESOLVED, Ordering::Release);
    }
}

impl<F: Signature> Slot<F> {
    /// The resolved function, if any.
    pub fn get(&self) -> Option<F> {
        // SAFETY: `Slot::new`'s contract guarantees the symbol has signature `F`.
        self.address()
            .map(|address| unsafe { F::from_address(address) })
    }
}
impl<F> core::fmt::Debug for Slot<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("symbol", &self.symbol)
            .field("state", &self.state())
            .field("address", &self.address())
            .finish()
    }
}

/// A set of slots resolved against the same library.
///
/// Implemented by the symbol tables `#[dynbind::import]` generates; implement it by hand to use
/// [`Binding`](crate::Binding) without the macro.
pub trait SymbolTable {
    /// Resolves every slot that hasn't been yet.
    fn resolve_all<L: Loader>(&self, library: &LibraryHandle<L>);
    /// Puts every slot back to [`SlotState::Unresolved`].
    fn reset_all(&mut self);
}
