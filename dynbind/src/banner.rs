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

use core::sync::atomic::{AtomicBool, Ordering};

use crate::version;

/// A once-only latch for the line identifying the binding protocol's version.
///
/// [`Banner::global`] is the one bindings use unless told otherwise; tests can make their own.
#[derive(Debug, Default)]
pub struct Banner {
    fired: AtomicBool,
}
impl Banner {
    pub const fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }
    /// The process-wide banner.
    pub fn global() -> &'static Banner {
        static GLOBAL: Banner = Banner::new();
        &GLOBAL
    }
    /// Logs the version line, unless this banner already has. Returns whether it did.
    pub fn fire(&self) -> bool {
        if self.fired.load(Ordering::Acquire)
            || self
                .fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return false;
        }
        tracing::info!(
            version = version::NAME,
            value = version::VALUE,
            build = version::build(),
            "dynbind runtime binding"
        );
        true
    }
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
