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

use crate::loader::SymbolAddress;

/// A function pointer type that a resolved symbol address can be turned into and called through.
///
/// Implemented for `extern "C"` and `extern "system"` function pointers, safe or `unsafe`, of up to 13 arguments.
/// Signatures with reference arguments aren't covered: use raw pointers, as the C headers do.
///
/// # Safety
/// `Self` must be a function pointer type, so that it has the size and representation of an address.
pub unsafe trait Signature: Copy {
    /// The arguments, as a tuple.
    type Args;
    type Output;
    const ARITY: usize;
    /// Reinterprets `address` as a function of this signature.
    ///
    /// # Safety
    /// `address` must point to a function with exactly this signature and calling convention.
    unsafe fn from_address(address: SymbolAddress) -> Self;
    /// Calls the function with `args`, forwarded as they are.
    ///
    /// # Safety
    /// Calls foreign code: whatever contract the native function has must be upheld by the caller.
    unsafe fn invoke(self, args: Self::Args) -> Self::Output;
}

macro_rules! impl_signature {
    (@count) => { 0 };
    (@count $head: ident $($tail: ident)*) => { 1 + impl_signature!(@count $($tail)*) };
    (@fn [$($ty: tt)*] $($arg: ident),*) => {
        unsafe impl<R $(, $arg)*> Signature for $($ty)* {
            type Args = ($($arg,)*);
            type Output = R;
            const ARITY: usize = impl_signature!(@count $($arg)*);
            unsafe fn from_address(address: SymbolAddress) -> Self {
                debug_assert_eq!(core::mem::size_of::<Self>(), core::mem::size_of::<*mut ()>());
                core::mem::transmute_copy::<*mut core::ffi::c_void, Self>(&address.as_ptr())
            }
            #[allow(non_snake_case, clippy::unused_unit)]
            unsafe fn invoke(self, args: Self::Args) -> R {
                let ($($arg,)*) = args;
                (self)($($arg),*)
            }
        }
    };
    (@abi $abi: tt $($arg: ident),*) => {
        impl_signature!(@fn [extern $abi fn($($arg),*) -> R] $($arg),*);
        impl_signature!(@fn [unsafe extern $abi fn($($arg),*) -> R] $($arg),*);
    };
    ($($arg: ident),*) => {
        impl_signature!(@abi "C" $($arg),*);
        impl_signature!(@abi "system" $($arg),*);
    };
}

impl_signature!();
impl_signature!(A0);
impl_signature!(A0, A1);
impl_signature!(A0, A1, A2);
impl_signature!(A0, A1, A2, A3);
impl_signature!(A0, A1, A2, A3, A4);
impl_signature!(A0, A1, A2, A3, A4, A5);
impl_signature!(A0, A1, A2, A3, A4, A5, A6);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7, A8);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_signature!(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);
