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

use std::process::Command;

fn main() -> Result<(), std::io::Error> {
    use std::{
        fs::File,
        io::{BufWriter, Write},
        path::PathBuf,
    };
    let rustc = std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    let output = Command::new(rustc)
        .arg("-vV")
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
        .unwrap_or_default();
    let mut release = "unknown";
    for line in output.lines() {
        if let Some(r) = line.trim().strip_prefix("release: ") {
            release = r;
        }
    }
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());
    let build_info = PathBuf::from(std::env::var_os("OUT_DIR").unwrap()).join("build_info.rs");
    let mut build_info = BufWriter::new(File::create(build_info)?);
    writeln!(
        build_info,
        r#"pub(crate) const BUILD: &str = "rustc {release}, {profile}";"#
    )?;
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");
    Ok(())
}
