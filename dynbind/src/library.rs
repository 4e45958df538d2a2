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

//! Finding and opening a library among several candidate names and versions.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use crate::{
    error::LoadError,
    loader::{LoadMode, Loader, SymbolAddress, SystemLoader},
    naming::{self, Version},
};

/// The names and versions a library may be found under, in probe order.
///
/// Names are probed outermost: every version of the first name is tried before the second name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    names: Vec<Cow<'static, str>>,
    versions: Vec<Version>,
    env: Option<Cow<'static, str>>,
}
impl Candidates {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            versions: Vec::new(),
            env: None,
        }
    }
    /// Sets the versions to probe for each name. Defaults to [`Version::None`] only.
    pub fn versions<I, V>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Version>,
    {
        self.versions = versions.into_iter().map(Into::into).collect();
        self
    }
    /// If the environment variable `var` is set to a non-empty value, that value is probed before any other
    /// candidate, without version.
    pub fn env_override(mut self, var: impl Into<Cow<'static, str>>) -> Self {
        self.env = Some(var.into());
        self
    }
    pub fn names(&self) -> &[Cow<'static, str>] {
        &self.names
    }
    pub fn version_list(&self) -> &[Version] {
        &self.versions
    }
    /// Every `(name, version)` pair to probe, in order.
    pub fn iter(&self) -> impl Iterator<Item = (Cow<'_, str>, Version)> + '_ {
        let env = self
            .env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.is_empty())
            .map(|value| (Cow::Owned(value), Version::None));
        let versions = &self.versions;
        env.into_iter().chain(self.names.iter().flat_map(move |name| {
            naming::probe_order(versions).map(move |version| (Cow::Borrowed(&**name), version))
        }))
    }
    /// Finds the first candidate that is already mapped into the process, without loading anything.
    ///
    /// Returns the file name that matched.
    pub fn find_mapped<L: Loader>(&self, loader: &mut L) -> Option<String> {
        self.iter().find_map(|(name, version)| {
            set_candidate(loader, &name, version);
            loader
                .load(LoadMode::Probe)
                .ok()
                .map(|()| loader.file_name().to_owned())
        })
    }
}

fn set_candidate<L: Loader>(loader: &mut L, name: &str, version: Version) {
    match version {
        Version::Number(_) => loader.set_file_name_and_version(name, version),
        Version::None | Version::End => loader.set_file_name(name),
    }
}

/// One try at opening a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub name: String,
    pub version: Version,
    pub file_name: String,
    /// The error's text, if opening failed.
    pub error: Option<String>,
}

/// Owns the loader for one library, opened from the first candidate that loads.
///
/// Failing to open any candidate isn't an error here: the handle simply stays unloaded, and symbol
/// resolution against it fails. The library is unloaded when the handle is dropped.
#[derive(Debug)]
pub struct LibraryHandle<L: Loader = SystemLoader> {
    loader: L,
    candidates: Candidates,
    attempts: Vec<Attempt>,
    path: Option<PathBuf>,
    generation: u64,
}
impl<L: Loader> LibraryHandle<L> {
    /// Probes `candidates` in order with `loader`, stopping at the first that loads.
    pub fn open(loader: L, candidates: Candidates) -> Self {
        let mut this = Self {
            loader,
            candidates,
            attempts: Vec::new(),
            path: None,
            generation: 0,
        };
        this.search();
        this
    }
    fn search(&mut self) -> bool {
        let Self {
            loader,
            candidates,
            attempts,
            ..
        } = self;
        for (name, version) in candidates.iter() {
            set_candidate(loader, &name, version);
            let file_name = loader.file_name().to_owned();
            let result = loader.load(LoadMode::Full);
            attempts.push(Attempt {
                name: name.into_owned(),
                version,
                file_name: file_name.clone(),
                error: result.as_ref().err().map(ToString::to_string),
            });
            match result {
                Ok(()) => {
                    self.path = loader.path();
                    self.generation += 1;
                    tracing::info!(file_name, path = ?self.path, "loaded");
                    return true;
                }
                Err(error) => tracing::debug!(file_name, %error, "can not load"),
            }
        }
        tracing::warn!(
            tried = ?self.tried(),
            "no candidate library could be loaded"
        );
        false
    }
    pub fn is_loaded(&self) -> bool {
        self.loader.is_loaded()
    }
    /// Looks `symbol` up in the library; `None` if it isn't loaded or doesn't export it.
    pub fn resolve(&self, symbol: &str) -> Option<SymbolAddress> {
        if !self.is_loaded() {
            return None;
        }
        self.loader.resolve(symbol)
    }
    /// The path the OS mapped, once loaded.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
    pub fn candidates(&self) -> &Candidates {
        &self.candidates
    }
    /// Every candidate tried by the last search, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }
    /// The file names tried by the last search.
    pub fn tried(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.file_name.clone()).collect()
    }
    pub fn loader(&self) -> &L {
        &self.loader
    }
    /// How many times a candidate was successfully loaded by this handle.
    pub fn generation(&self) -> u64 {
        self.generation
    }
    /// Unloads the library. Unloading an unloaded handle succeeds.
    pub fn unload(&mut self) -> Result<(), LoadError> {
        self.path = None;
        self.loader.unload()
    }
    /// Unloads the library, then searches the candidates again.
    ///
    /// Any address obtained before this call must be considered dangling.
    pub fn reload(&mut self) -> bool {
        if let Err(error) = self.unload() {
            tracing::warn!(%error, "reloading without a clean unload");
        }
        self.attempts.clear();
        self.search()
    }
}
impl<L: Loader> Drop for LibraryHandle<L> {
    fn drop(&mut self) {
        if let Err(error) = self.loader.unload() {
            tracing::warn!(%error, "failed to unload");
        }
    }
}
