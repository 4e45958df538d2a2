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

use std::{
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use super::fake::{self, FakeLoader};
use crate::{
    Binding, Candidates, Config, DispatchError, LibraryHandle, LoadError, LoadMode, Loader, Slot,
    SlotState, SymbolAddress, SymbolTable, Version,
};

type AddFn = unsafe extern "C" fn(i32, i32) -> i32;
type AnswerFn = unsafe extern "C" fn() -> i32;

struct Table {
    foo: Slot<AnswerFn>,
    bar: Slot<AddFn>,
}
impl Table {
    fn new() -> Self {
        unsafe {
            Self {
                foo: Slot::new("foo"),
                bar: Slot::new("bar"),
            }
        }
    }
}
impl SymbolTable for Table {
    fn resolve_all<L: Loader>(&self, library: &LibraryHandle<L>) {
        self.foo.resolve(library);
        self.bar.resolve(library);
    }
    fn reset_all(&mut self) {
        self.foo.reset();
        self.bar.reset();
    }
}

fn config() -> Config {
    Config::new(Candidates::new(["m"]).versions([Version::Number(2)])).banner(None)
}
fn with_bar() -> FakeLoader {
    FakeLoader::new()
        .available("m", Version::Number(2))
        .symbol("bar", fake::add as *const ())
}

#[test]
fn eager_binding_resolves_on_open() {
    let loader = with_bar();
    let journal = loader.journal();
    let binding = Binding::open(loader, config().eager());
    let table = Table::new();
    assert_eq!(table.foo.state(), SlotState::Unresolved);
    binding.attach(&table);
    assert_eq!(table.foo.state(), SlotState::Missing);
    assert_eq!(table.bar.state(), SlotState::Resolved);
    assert_eq!(table.foo.address(), None);
    let bar = table.bar.address();
    assert!(bar.is_some());

    table.resolve_all(binding.library());
    assert_eq!(table.bar.address(), bar);
    assert_eq!(table.bar.state(), SlotState::Resolved);
    let journal = journal.lock().unwrap();
    assert_eq!(journal.lookups_of("foo"), 1);
    assert_eq!(journal.lookups_of("bar"), 1);
}

#[test]
fn missing_symbols_fail_without_calling() {
    let binding = Binding::open(with_bar(), config().eager());
    let table = Table::new();
    binding.attach(&table);
    let error = unsafe { binding.call(&table.foo, ()) }.unwrap_err();
    assert_eq!(
        error,
        DispatchError::Missing {
            symbol: "foo",
            path: Some("/fake/libm.so.2".into()),
        }
    );
    assert_eq!(
        error.to_string(),
        "can not call `foo`: symbol not found in /fake/libm.so.2"
    );
    assert_eq!(unsafe { binding.call(&table.bar, (40, 2)) }, Ok(42));
}

#[test]
fn lazy_binding_resolves_on_first_call() {
    let loader = with_bar();
    let journal = loader.journal();
    let binding = Binding::open(loader, config());
    let table = Table::new();
    binding.attach(&table);
    assert_eq!(table.bar.state(), SlotState::Unresolved);
    assert!(journal.lock().unwrap().lookups.is_empty());

    assert_eq!(unsafe { binding.call(&table.bar, (1, 2)) }, Ok(3));
    assert_eq!(unsafe { binding.call(&table.bar, (-1, 1)) }, Ok(0));
    assert_eq!(table.bar.state(), SlotState::Resolved);
    assert_eq!(table.foo.state(), SlotState::Unresolved);
    assert_eq!(journal.lock().unwrap().lookups, ["bar"]);
}

#[test]
fn unloaded_library_reports_what_was_tried() {
    let binding = Binding::open(FakeLoader::new(), config());
    let table = Table::new();
    assert!(!binding.is_loaded());
    let error = binding.get(&table.bar).unwrap_err();
    assert_eq!(
        error,
        DispatchError::NotLoaded {
            symbol: "bar",
            tried: vec!["libm.so.2".to_owned()],
        }
    );
    assert_eq!(error.symbol(), "bar");
    assert_eq!(table.bar.state(), SlotState::NotLoaded);
}

#[test]
fn failures_stick_until_reload() {
    let loader = with_bar();
    let journal = loader.journal();
    let mut binding = Binding::open(loader, config());
    let mut table = Table::new();
    assert!(binding.get(&table.foo).is_err());
    assert!(binding.get(&table.foo).is_err());
    assert_eq!(journal.lock().unwrap().lookups, ["foo", "_foo"]);

    assert!(binding.get(&table.bar).is_ok());
    assert!(binding.reload(&mut table));
    assert_eq!(binding.library().generation(), 2);
    assert_eq!(table.foo.state(), SlotState::Unresolved);
    assert_eq!(table.bar.state(), SlotState::Unresolved);
    assert!(binding.get(&table.foo).is_err());
    let journal = journal.lock().unwrap();
    assert_eq!(journal.lookups_of("foo"), 2);
    assert_eq!(journal.lookups_of("_foo"), 2);
}

#[test]
fn reload_reattaches_eager_tables() {
    let mut binding = Binding::open(with_bar(), config().eager());
    let mut table = Table::new();
    binding.attach(&table);
    assert!(binding.reload(&mut table));
    assert_eq!(table.bar.state(), SlotState::Resolved);
    assert_eq!(table.foo.state(), SlotState::Missing);
}

#[test]
fn concurrent_first_calls_resolve_once() {
    let loader = with_bar();
    let journal = loader.journal();
    let binding = Binding::open(loader, config());
    let table = Table::new();
    let sums = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let (binding, table) = (&binding, &table);
                s.spawn(move || unsafe { binding.call(&table.bar, (i, i)) })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .sum::<i32>()
    });
    assert_eq!(sums, (0..16).map(|i| 2 * i).sum::<i32>());
    assert_eq!(journal.lock().unwrap().lookups_of("bar"), 1);
}

/// Panics on its first `panics` lookups.
struct Unreliable {
    inner: FakeLoader,
    panics: AtomicUsize,
}
impl Loader for Unreliable {
    fn set_file_name_and_version(&mut self, name: &str, version: Version) {
        self.inner.set_file_name_and_version(name, version)
    }
    fn file_name(&self) -> &str {
        self.inner.file_name()
    }
    fn load(&mut self, mode: LoadMode) -> Result<(), LoadError> {
        self.inner.load(mode)
    }
    fn unload(&mut self) -> Result<(), LoadError> {
        self.inner.unload()
    }
    fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }
    fn lookup(&self, symbol: &str) -> Option<SymbolAddress> {
        let left = self.panics.load(Ordering::Relaxed);
        if left > 0 {
            self.panics.store(left - 1, Ordering::Relaxed);
            panic!("lookup of {symbol} failed");
        }
        self.inner.lookup(symbol)
    }
    fn path(&self) -> Option<PathBuf> {
        self.inner.path()
    }
}

#[test]
fn unwinding_lookup_leaves_the_slot_unresolved() {
    let loader = Unreliable {
        inner: with_bar(),
        panics: AtomicUsize::new(1),
    };
    let binding = Binding::open(loader, config());
    let table = Table::new();
    let unwound = panic::catch_unwind(AssertUnwindSafe(|| binding.get(&table.bar)));
    assert!(unwound.is_err());
    assert_eq!(table.bar.state(), SlotState::Unresolved);
    assert_eq!(unsafe { binding.call(&table.bar, (19, 23)) }, Ok(42));
    assert_eq!(table.bar.state(), SlotState::Resolved);
}
