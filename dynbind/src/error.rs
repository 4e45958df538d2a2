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

use std::path::PathBuf;

/// Why a [`Loader`](crate::Loader) failed to open or close a library.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no file name was set")]
    NoFileName,
    #[error("can not load `{file_name}`: {source}")]
    Open {
        file_name: String,
        #[source]
        source: libloading::Error,
    },
    #[error("`{file_name}` is not mapped into this process")]
    NotMapped { file_name: String },
    #[error("can not unload `{file_name}`: {source}")]
    Close {
        file_name: String,
        #[source]
        source: libloading::Error,
    },
    /// Used by loaders that don't go through `libloading`.
    #[error("can not load `{file_name}`: {reason}")]
    Other { file_name: String, reason: String },
}

/// Returned by a binding's methods instead of calling through a null function pointer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// None of the candidate files could be loaded.
    #[error("can not call `{symbol}`: library not loaded (tried {tried:?})")]
    NotLoaded {
        symbol: &'static str,
        tried: Vec<String>,
    },
    /// The library is loaded, but doesn't export the symbol.
    #[error("can not call `{symbol}`: symbol not found in {}", display_path(.path))]
    Missing {
        symbol: &'static str,
        path: Option<PathBuf>,
    },
}
fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "<unknown path>".into(), |p| p.display().to_string())
}

impl DispatchError {
    pub fn symbol(&self) -> &'static str {
        match self {
            DispatchError::NotLoaded { symbol, .. } | DispatchError::Missing { symbol, .. } => {
                symbol
            }
        }
    }
}
