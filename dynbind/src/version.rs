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

//! The version of the binding protocol implemented by this crate.
//!
//! This is what the one-time [`Banner`](crate::Banner) reports when the first binding of a process opens.

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const fn parse(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

pub const MAJOR: u32 = parse(env!("CARGO_PKG_VERSION_MAJOR"));
pub const MINOR: u32 = parse(env!("CARGO_PKG_VERSION_MINOR"));
pub const PATCH: u32 = parse(env!("CARGO_PKG_VERSION_PATCH"));
/// `MAJOR`, `MINOR` and `PATCH` packed one byte each, `0x00MMmmpp`.
pub const VALUE: u32 = ((MAJOR & 0xff) << 16) | ((MINOR & 0xff) << 8) | (PATCH & 0xff);
/// `"MAJOR.MINOR.PATCH"`
pub const NAME: &str = env!("CARGO_PKG_VERSION");

/// The compiler release and cargo profile this crate was built with.
pub fn build() -> &'static str {
    BUILD
}

#[cfg(test)]
mod tests {
    #[test]
    fn packed_value_matches_parts() {
        assert_eq!(super::VALUE >> 16, super::MAJOR & 0xff);
        assert_eq!((super::VALUE >> 8) & 0xff, super::MINOR & 0xff);
        assert_eq!(super::VALUE & 0xff, super::PATCH & 0xff);
        assert_eq!(
            super::NAME,
            format!("{}.{}.{}", super::MAJOR, super::MINOR, super::PATCH)
        );
        assert!(super::build().starts_with("rustc "));
    }
}
