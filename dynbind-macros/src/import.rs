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

use proc_macro2::TokenStream;
use quote::{format_ident, quote, ToTokens};
use syn::{parse::Parse, punctuated::Punctuated, spanned::Spanned, Token};

enum Version {
    None,
    Number(u32),
    End,
}
impl Parse for Version {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        if input.peek(syn::LitInt) {
            let lit: syn::LitInt = input.parse()?;
            return Ok(Version::Number(lit.base10_parse()?));
        }
        let ident: syn::Ident = input.parse()?;
        match ident.to_string().as_str() {
            "none" => Ok(Version::None),
            "end" => Ok(Version::End),
            _ => Err(syn::Error::new(
                ident.span(),
                "expected a version number, `none` or `end`",
            )),
        }
    }
}

enum Attr {
    Binding(syn::Ident),
    Names(Vec<syn::LitStr>),
    Versions(Vec<Version>),
    Eager(bool),
    Env(syn::LitStr),
}
impl Parse for Attr {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let key: syn::Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        match key.to_string().as_str() {
            "binding" => Ok(Attr::Binding(input.parse()?)),
            "names" => {
                let content;
                syn::bracketed!(content in input);
                let names = Punctuated::<syn::LitStr, Token![,]>::parse_terminated(&content)?;
                Ok(Attr::Names(names.into_iter().collect()))
            }
            "versions" => {
                let content;
                syn::bracketed!(content in input);
                let versions = Punctuated::<Version, Token![,]>::parse_terminated(&content)?;
                Ok(Attr::Versions(versions.into_iter().collect()))
            }
            "resolve" => {
                let policy: syn::Ident = input.parse()?;
                match policy.to_string().as_str() {
                    "eager" => Ok(Attr::Eager(true)),
                    "lazy" => Ok(Attr::Eager(false)),
                    _ => Err(syn::Error::new(policy.span(), "expected `eager` or `lazy`")),
                }
            }
            "env" => Ok(Attr::Env(input.parse()?)),
            _ => Err(syn::Error::new(key.span(), "Unsupported attribute for `dynbind::import`: only `binding`, `names`, `versions`, `resolve` and `env` are supported")),
        }
    }
}

struct Attrs {
    binding: syn::Ident,
    names: Vec<syn::LitStr>,
    versions: Vec<Version>,
    eager: bool,
    env: Option<syn::LitStr>,
}
impl Parse for Attrs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let span = input.span();
        let mut binding = None;
        let mut names = None;
        let mut versions = Vec::new();
        let mut eager = false;
        let mut env = None;
        for attr in Punctuated::<Attr, Token![,]>::parse_terminated(input)? {
            match attr {
                Attr::Binding(b) => binding = Some(b),
                Attr::Names(n) => names = Some(n),
                Attr::Versions(v) => versions = v,
                Attr::Eager(e) => eager = e,
                Attr::Env(e) => env = Some(e),
            }
        }
        let binding = binding.ok_or_else(|| {
            syn::Error::new(span, "`dynbind::import` needs a `binding = Name` to generate")
        })?;
        let names = match names {
            Some(names) if !names.is_empty() => names,
            _ => {
                return Err(syn::Error::new(
                    span,
                    "`dynbind::import` needs at least one candidate in `names = [..]`",
                ))
            }
        };
        Ok(Self {
            binding,
            names,
            versions,
            eager,
            env,
        })
    }
}

/// One foreign function, as it will be bound.
struct Import {
    attrs: Vec<syn::Attribute>,
    cfgs: Vec<syn::Attribute>,
    vis: syn::Visibility,
    ident: syn::Ident,
    symbol: syn::LitStr,
    args: Vec<syn::Ident>,
    tys: Vec<syn::Type>,
    output: TokenStream,
}
impl Import {
    fn new(item: syn::ForeignItemFn) -> syn::Result<Self> {
        let syn::ForeignItemFn {
            attrs: fn_attrs,
            vis,
            sig,
            ..
        } = item;
        if let Some(variadic) = &sig.variadic {
            return Err(syn::Error::new(
                variadic.span(),
                "variadic functions can't be bound at runtime",
            ));
        }
        if !sig.generics.params.is_empty() {
            return Err(syn::Error::new(
                sig.generics.span(),
                "foreign functions can't be generic",
            ));
        }
        let mut symbol = syn::LitStr::new(&sig.ident.to_string(), sig.ident.span());
        let mut attrs = Vec::new();
        let mut cfgs = Vec::new();
        for attr in fn_attrs {
            if attr.path.is_ident("link_name") {
                match attr.parse_meta()? {
                    syn::Meta::NameValue(syn::MetaNameValue {
                        lit: syn::Lit::Str(name),
                        ..
                    }) => symbol = name,
                    meta => {
                        return Err(syn::Error::new(
                            meta.span(),
                            "expected `#[link_name = \"symbol\"]`",
                        ))
                    }
                }
            } else if attr.path.is_ident("cfg") {
                cfgs.push(attr);
            } else {
                attrs.push(attr);
            }
        }
        let mut args = Vec::new();
        let mut tys = Vec::new();
        for (i, input) in sig.inputs.into_iter().enumerate() {
            let (pat, ty) = match input {
                syn::FnArg::Typed(syn::PatType { pat, ty, .. }) => (pat, ty),
                receiver => {
                    return Err(syn::Error::new(
                        receiver.span(),
                        "foreign functions have no receiver",
                    ))
                }
            };
            if let syn::Type::Reference(r) = &*ty {
                return Err(syn::Error::new(
                    r.span(),
                    "references can't cross a runtime binding: use a raw pointer",
                ));
            }
            args.push(match *pat {
                syn::Pat::Ident(syn::PatIdent { ident, .. }) => ident,
                _ => format_ident!("arg{i}"),
            });
            tys.push(*ty);
        }
        let output = match sig.output {
            syn::ReturnType::Default => quote!(()),
            syn::ReturnType::Type(_, ty) => ty.into_token_stream(),
        };
        Ok(Self {
            attrs,
            cfgs,
            vis,
            ident: sig.ident,
            symbol,
            args,
            tys,
            output,
        })
    }
}

pub fn import(attrs: TokenStream, block: syn::ItemForeignMod) -> syn::Result<TokenStream> {
    let st = crate::tl_mod();
    let Attrs {
        binding,
        names,
        versions,
        eager,
        env,
    } = syn::parse2(attrs)?;
    let abi = block
        .abi
        .name
        .clone()
        .unwrap_or_else(|| syn::LitStr::new("C", block.abi.span()));
    let imports = block
        .items
        .into_iter()
        .map(|item| match item {
            syn::ForeignItem::Fn(f) => Import::new(f),
            item => Err(syn::Error::new(
                item.span(),
                "only functions can be bound at runtime",
            )),
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let symbols = format_ident!("{}Symbols", binding);
    let versions = versions.iter().map(|v| match v {
        Version::None => quote!(#st::Version::None),
        Version::Number(n) => quote!(#st::Version::Number(#n)),
        Version::End => quote!(#st::Version::End),
    });
    let resolution = if eager {
        quote!(#st::Resolution::Eager)
    } else {
        quote!(#st::Resolution::Lazy)
    };
    let env = env.map(|var| quote!(.env_override(#var)));

    let mut fields = Vec::new();
    let mut inits = Vec::new();
    let mut resolves = Vec::new();
    let mut resets = Vec::new();
    let mut methods = Vec::new();
    for Import {
        attrs,
        cfgs,
        vis,
        ident,
        symbol,
        args,
        tys,
        output,
    } in &imports
    {
        let doc = format!("The slot for `{}`.", symbol.value());
        fields.push(quote! {
            #(#cfgs)*
            #[doc = #doc]
            pub #ident: #st::Slot<unsafe extern #abi fn(#(#tys),*) -> #output>,
        });
        inits.push(quote! {
            #(#cfgs)*
            #ident: #st::Slot::new(#symbol),
        });
        resolves.push(quote! {
            #(#cfgs)*
            self.#ident.resolve(library);
        });
        resets.push(quote! {
            #(#cfgs)*
            self.#ident.reset();
        });
        methods.push(quote! {
            #(#cfgs)*
            #(#attrs)*
            #[allow(non_snake_case, clippy::too_many_arguments, clippy::missing_safety_doc, unused_unsafe)]
            #vis unsafe fn #ident(&self #(, #args: #tys)*) -> ::core::result::Result<#output, #st::DispatchError> {
                unsafe { self.binding.call(&self.symbols.#ident, (#(#args,)*)) }
            }
        });
    }

    let binding_doc = format!(
        "Runtime binding to the first of {:?} that loads.",
        names.iter().map(syn::LitStr::value).collect::<Vec<_>>()
    );
    let symbols_doc = format!("The symbol slots of [`{binding}`].");
    Ok(quote! {
        #[doc = #symbols_doc]
        #[allow(non_snake_case)]
        pub struct #symbols {
            #(#fields)*
        }
        impl #symbols {
            pub const fn new() -> Self {
                // SAFETY: each slot is typed after its declaration in the `extern` block.
                unsafe {
                    Self {
                        #(#inits)*
                    }
                }
            }
        }
        impl ::core::default::Default for #symbols {
            fn default() -> Self {
                Self::new()
            }
        }
        impl #st::SymbolTable for #symbols {
            fn resolve_all<L: #st::Loader>(&self, library: &#st::LibraryHandle<L>) {
                #(#resolves)*
            }
            fn reset_all(&mut self) {
                #(#resets)*
            }
        }

        #[doc = #binding_doc]
        pub struct #binding<L: #st::Loader = #st::SystemLoader> {
            binding: #st::Binding<L>,
            symbols: #symbols,
        }
        impl #binding<#st::SystemLoader> {
            /// Opens the library with the system loader.
            pub fn new() -> Self {
                Self::with_loader(#st::SystemLoader::new())
            }
        }
        impl ::core::default::Default for #binding<#st::SystemLoader> {
            fn default() -> Self {
                Self::new()
            }
        }
        impl<L: #st::Loader> #binding<L> {
            pub const NAMES: &'static [&'static str] = &[#(#names),*];
            pub const VERSIONS: &'static [#st::Version] = &[#(#versions),*];
            pub const RESOLUTION: #st::Resolution = #resolution;
            /// The configuration this binding was declared with.
            pub fn config() -> #st::Config {
                #st::Config::new(
                    #st::Candidates::new(Self::NAMES.iter().copied())
                        .versions(Self::VERSIONS.iter().copied())
                        #env
                )
                .resolution(Self::RESOLUTION)
            }
            pub fn with_loader(loader: L) -> Self {
                Self::with_config(loader, Self::config())
            }
            pub fn with_config(loader: L, config: #st::Config) -> Self {
                let binding = #st::Binding::open(loader, config);
                let symbols = #symbols::new();
                binding.attach(&symbols);
                Self { binding, symbols }
            }
            pub fn is_loaded(&self) -> bool {
                self.binding.is_loaded()
            }
            pub fn binding(&self) -> &#st::Binding<L> {
                &self.binding
            }
            pub fn symbols(&self) -> &#symbols {
                &self.symbols
            }
            /// Resolves every symbol that hasn't been yet, whatever the resolution policy.
            pub fn resolve_all(&self) {
                #st::SymbolTable::resolve_all(&self.symbols, self.binding.library());
            }
            /// Unloads the library and searches the candidates again; every symbol will be resolved anew.
            pub fn reload(&mut self) -> bool {
                self.binding.reload(&mut self.symbols)
            }
            #(#methods)*
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(attrs: &str, block: &str) -> syn::Result<String> {
        import(syn::parse_str(attrs)?, syn::parse_str(block)?).map(|t| t.to_string())
    }

    #[test]
    fn parses_attributes() {
        let attrs: Attrs = syn::parse_str(
            r#"binding = Sdl, names = ["SDL", "SDL-1.2"], versions = [none, 2, 1, end], resolve = eager, env = "SDL_LIBRARY""#,
        )
        .unwrap();
        assert_eq!(attrs.binding, "Sdl");
        assert_eq!(
            attrs.names.iter().map(syn::LitStr::value).collect::<Vec<_>>(),
            ["SDL", "SDL-1.2"]
        );
        assert!(matches!(
            attrs.versions[..],
            [Version::None, Version::Number(2), Version::Number(1), Version::End]
        ));
        assert!(attrs.eager);
        assert_eq!(attrs.env.unwrap().value(), "SDL_LIBRARY");

        let attrs: Attrs = syn::parse_str(r#"binding = Z, names = ["z"]"#).unwrap();
        assert!(attrs.versions.is_empty());
        assert!(!attrs.eager);
    }

    #[test]
    fn rejects_bad_attributes() {
        assert!(syn::parse_str::<Attrs>(r#"names = ["z"]"#).is_err());
        assert!(syn::parse_str::<Attrs>(r#"binding = Z, names = []"#).is_err());
        assert!(syn::parse_str::<Attrs>(r#"binding = Z, names = ["z"], resolve = later"#).is_err());
        assert!(syn::parse_str::<Attrs>(r#"binding = Z, names = ["z"], versions = [latest]"#).is_err());
        assert!(syn::parse_str::<Attrs>(r#"binding = Z, names = ["z"], path = "/tmp""#).is_err());
    }

    #[test]
    fn reads_foreign_functions() {
        let item: syn::ForeignItemFn = syn::parse_str(
            r#"#[link_name = "zError"] #[doc = "error text"] pub fn z_error(code: c_int, _: u8) -> *const c_char;"#,
        )
        .unwrap();
        let import = Import::new(item).unwrap();
        assert_eq!(import.ident, "z_error");
        assert_eq!(import.symbol.value(), "zError");
        assert_eq!(import.args.len(), 2);
        assert_eq!(import.args[0], "code");
        assert_eq!(import.args[1], "arg1");
        assert_eq!(import.attrs.len(), 1);

        let item: syn::ForeignItemFn = syn::parse_str("fn quit();").unwrap();
        let import = Import::new(item).unwrap();
        assert_eq!(import.symbol.value(), "quit");
        assert_eq!(import.output.to_string(), "()");
    }

    #[test]
    fn rejects_unbindable_functions() {
        let attrs = r#"binding = C, names = ["c"]"#;
        assert!(expand(attrs, r#"extern "C" { fn printf(fmt: *const c_char, ...) -> c_int; }"#).is_err());
        assert!(expand(attrs, r#"extern "C" { fn strlen(s: &u8) -> usize; }"#).is_err());
        assert!(expand(attrs, r#"extern "C" { static errno: c_int; }"#).is_err());
    }

    #[test]
    fn generates_a_binding() {
        let code = expand(
            r#"binding = Zlib, names = ["z", "zlib"], versions = [none, 1], resolve = eager"#,
            r#"extern "C" { pub fn zlibVersion() -> *const c_char; #[link_name = "zError"] pub fn z_error(code: c_int) -> *const c_char; }"#,
        )
        .unwrap();
        for expected in [
            "pub struct Zlib",
            "pub struct ZlibSymbols",
            "Slot :: new (\"zlibVersion\")",
            "Slot :: new (\"zError\")",
            "Resolution :: Eager",
            "Version :: Number (1u32)",
            "pub unsafe fn z_error (& self , code : c_int)",
        ] {
            assert!(code.contains(expected), "`{expected}` not in {code}");
        }
    }
}
