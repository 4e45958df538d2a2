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

//! A scripted [`Loader`] that journals everything asked of it.

use core::ptr::NonNull;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    naming::{self, Platform},
    LoadError, LoadMode, Loader, SymbolAddress, Version,
};

#[derive(Debug, Default)]
pub struct Journal {
    pub candidates: Vec<(String, Version)>,
    pub loads: Vec<(String, LoadMode)>,
    pub lookups: Vec<String>,
    pub unloads: usize,
}
impl Journal {
    pub fn lookups_of(&self, symbol: &str) -> usize {
        self.lookups.iter().filter(|s| *s == symbol).count()
    }
}

#[derive(Debug, Default)]
pub struct FakeLoader {
    available: Vec<(String, Version)>,
    mapped: Vec<String>,
    symbols: HashMap<String, usize>,
    file_name: String,
    current: Option<(String, Version)>,
    loaded: bool,
    journal: Arc<Mutex<Journal>>,
}
impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }
    /// Makes `name` at `version` loadable.
    pub fn available(mut self, name: &str, version: Version) -> Self {
        self.available.push((name.into(), version));
        self
    }
    /// Pretends `file_name` is already mapped into the process.
    pub fn mapped(mut self, file_name: &str) -> Self {
        self.mapped.push(file_name.into());
        self
    }
    pub fn symbol(mut self, name: &str, address: *const ()) -> Self {
        self.symbols.insert(name.into(), address as usize);
        self
    }
    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        self.journal.clone()
    }
    // tolerates poisoning: a failed assertion may still hold the journal when the loader drops.
    fn log(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl Loader for FakeLoader {
    fn set_file_name_and_version(&mut self, name: &str, version: Version) {
        self.log().candidates.push((name.into(), version));
        self.file_name = naming::file_name_with_version(Platform::Unix, name, version);
        self.current = Some((name.into(), version));
    }
    fn file_name(&self) -> &str {
        &self.file_name
    }
    fn load(&mut self, mode: LoadMode) -> Result<(), LoadError> {
        self.log().loads.push((self.file_name.clone(), mode));
        let found = match mode {
            LoadMode::Probe => self.mapped.contains(&self.file_name),
            LoadMode::Full => self
                .current
                .as_ref()
                .map_or(false, |current| self.available.contains(current)),
        };
        if !found {
            return Err(LoadError::Other {
                file_name: self.file_name.clone(),
                reason: "no such file".into(),
            });
        }
        if mode == LoadMode::Full {
            self.loaded = true;
        }
        Ok(())
    }
    fn unload(&mut self) -> Result<(), LoadError> {
        if self.loaded {
            self.loaded = false;
            self.log().unloads += 1;
        }
        Ok(())
    }
    fn is_loaded(&self) -> bool {
        self.loaded
    }
    fn lookup(&self, symbol: &str) -> Option<SymbolAddress> {
        self.log().lookups.push(symbol.into());
        if !self.loaded {
            return None;
        }
        self.symbols
            .get(symbol)
            .and_then(|&address| NonNull::new(address as *mut _))
    }
    fn path(&self) -> Option<PathBuf> {
        self.loaded
            .then(|| PathBuf::from("/fake").join(&self.file_name))
    }
}

pub extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}
pub extern "C" fn answer() -> i32 {
    42
}
pub extern "C" fn negate(x: f64) -> f64 {
    -x
}
