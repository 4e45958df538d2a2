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

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;

mod import;

pub(crate) fn tl_mod() -> proc_macro2::TokenStream {
    match proc_macro_crate::crate_name("dynbind") {
        Ok(proc_macro_crate::FoundCrate::Itself) => quote!(crate),
        Ok(proc_macro_crate::FoundCrate::Name(crate_name)) => {
            let crate_name = Ident::new(&crate_name, Span::call_site());
            quote!(::#crate_name)
        }
        Err(_) => quote!(::dynbind),
    }
}

/// Binds the functions of an `extern` block to a library opened at runtime.
///
/// ```ignore
/// #[dynbind::import(binding = Sdl, names = ["SDL", "SDL-1.2"], versions = [none, 2, 1], resolve = eager)]
/// extern "C" {
///     pub fn SDL_Init(flags: u32) -> c_int;
///     pub fn SDL_Quit();
/// }
/// ```
///
/// Generates `Sdl<L = SystemLoader>`, which owns a `dynbind::Binding` and exposes each function as an
/// `unsafe` method returning `Result<_, DispatchError>`, and `SdlSymbols`, the table of its slots.
///
/// Arguments:
/// - `binding = Ident` (required): the name of the generated binding.
/// - `names = ["a", "b"]` (required): candidate library names, in probe order.
/// - `versions = [none, 1, end]`: versions probed for each name, `none` meaning no version suffix. Defaults to `[none]`.
/// - `resolve = lazy | eager`: when symbols are resolved. Defaults to `lazy`.
/// - `env = "VAR"`: an environment variable that, when set, names a file to try before any candidate.
///
/// `#[link_name = "symbol"]` on a function binds it to a symbol of another name.
#[proc_macro_attribute]
pub fn import(attrs: TokenStream, block: TokenStream) -> TokenStream {
    let block = match syn::parse(block) {
        Ok(block) => block,
        Err(e) => return e.to_compile_error().into(),
    };
    crate::import::import(attrs.into(), block)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
