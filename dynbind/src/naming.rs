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

//! Turning a bare library name into the file name the platform's loader expects.

use std::path::Path;

/// A version marker for a candidate library file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// No version suffix: `libz.so`.
    None,
    /// A numeric version: `libz.so.1` on unix, `libz.1.dylib` on apple.
    Number(u32),
    /// Terminates a version list; anything after it is never probed.
    End,
}
impl Version {
    /// The C-style encoding of [`Version::None`].
    pub const RAW_NONE: i32 = -1;
    /// The C-style encoding of [`Version::End`].
    pub const RAW_END: i32 = -2;
    /// Decodes a C-style version table entry.
    ///
    /// Unknown negative values are treated as [`Version::End`].
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            Self::RAW_NONE => Version::None,
            v if v >= 0 => Version::Number(v as u32),
            _ => Version::End,
        }
    }
    /// Encodes this marker as a C-style version table entry.
    ///
    /// Numbers above `i32::MAX` have no encoding and yield `None`.
    pub const fn to_raw(self) -> Option<i32> {
        match self {
            Version::None => Some(Self::RAW_NONE),
            Version::Number(v) if v <= i32::MAX as u32 => Some(v as i32),
            Version::Number(_) => None,
            Version::End => Some(Self::RAW_END),
        }
    }
}
impl From<u32> for Version {
    fn from(value: u32) -> Self {
        Version::Number(value)
    }
}
impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Version::None => f.write_str("no version"),
            Version::Number(v) => write!(f, "{v}"),
            Version::End => f.write_str("end"),
        }
    }
}

/// Iterates over `versions` up to the first [`Version::End`].
///
/// An empty list yields a single [`Version::None`].
pub fn probe_order(versions: &[Version]) -> impl Iterator<Item = Version> + '_ {
    let fallback: &'static [Version] = &[Version::None];
    let versions = if versions.is_empty() {
        fallback
    } else {
        versions
    };
    versions
        .iter()
        .copied()
        .take_while(|v| !matches!(v, Version::End))
}

/// The shared-library naming convention of a family of platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// ELF sonames: `libNAME.so.VERSION`.
    Unix,
    /// Mach-O: `libNAME.VERSION.dylib`, plus `NAME.framework/NAME`.
    Apple,
    /// PE: `NAME.dll`. Versions are not part of dll names and are ignored.
    Windows,
}
impl Platform {
    pub const fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_vendor = "apple") {
            Platform::Apple
        } else {
            Platform::Unix
        }
    }
    pub const fn prefix(self) -> &'static str {
        match self {
            Platform::Unix | Platform::Apple => "lib",
            Platform::Windows => "",
        }
    }
    pub const fn extension(self) -> &'static str {
        match self {
            Platform::Unix => ".so",
            Platform::Apple => ".dylib",
            Platform::Windows => ".dll",
        }
    }
    fn is_absolute(self, name: &str) -> bool {
        match self {
            Platform::Windows => {
                let bytes = name.as_bytes();
                name.starts_with("\\\\")
                    || (bytes.len() > 2
                        && bytes[0].is_ascii_alphabetic()
                        && bytes[1] == b':'
                        && matches!(bytes[2], b'\\' | b'/'))
            }
            Platform::Unix | Platform::Apple => name.starts_with('/'),
        }
    }
    fn has_extension(self, name: &str) -> bool {
        let file = match self {
            Platform::Windows => name.rsplit(['/', '\\']).next(),
            Platform::Unix | Platform::Apple => name.rsplit('/').next(),
        }
        .unwrap_or(name);
        match self {
            // `libfoo.so`, `libfoo.so.2`, `libfoo.so.2.1`
            Platform::Unix => file.ends_with(".so") || file.contains(".so."),
            Platform::Apple => file.ends_with(".dylib"),
            Platform::Windows => file.to_ascii_lowercase().ends_with(".dll"),
        }
    }
}
impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Computes the candidate file name for `name` on `platform`.
///
/// Absolute paths and names that already carry the platform's extension are returned unchanged.
pub fn file_name(platform: Platform, name: &str) -> String {
    file_name_with_version(platform, name, Version::None)
}

/// Like [`file_name`], but embeds `version` with the platform's convention.
///
/// [`Version::None`] and [`Version::End`] produce the same result as [`file_name`].
pub fn file_name_with_version(platform: Platform, name: &str, version: Version) -> String {
    if name.is_empty() || platform.is_absolute(name) || platform.has_extension(name) {
        return name.to_owned();
    }
    if platform == Platform::Apple {
        if let Some(framework) = name.strip_suffix(".framework") {
            let stem = Path::new(framework)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(framework);
            return format!("{name}/{stem}");
        }
    }
    let (dir, base) = match name.rfind(['/', '\\']) {
        Some(i) if platform == Platform::Windows || name.as_bytes()[i] == b'/' => {
            name.split_at(i + 1)
        }
        _ => ("", name),
    };
    let prefix = platform.prefix();
    let ext = platform.extension();
    match (platform, version) {
        (Platform::Unix, Version::Number(v)) => format!("{dir}{prefix}{base}{ext}.{v}"),
        (Platform::Apple, Version::Number(v)) => format!("{dir}{prefix}{base}.{v}{ext}"),
        _ => format!("{dir}{prefix}{base}{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_names() {
        assert_eq!(file_name(Platform::Unix, "z"), "libz.so");
        assert_eq!(
            file_name_with_version(Platform::Unix, "z", Version::Number(1)),
            "libz.so.1"
        );
        assert_eq!(
            file_name_with_version(Platform::Unix, "vendor/z", Version::Number(2)),
            "vendor/libz.so.2"
        );
        assert_eq!(file_name(Platform::Unix, "libz.so.1"), "libz.so.1");
        assert_eq!(file_name(Platform::Unix, "/opt/z/libz.so"), "/opt/z/libz.so");
        assert_eq!(
            file_name_with_version(Platform::Unix, "/opt/z/libz", Version::Number(1)),
            "/opt/z/libz"
        );
    }

    #[test]
    fn apple_names() {
        assert_eq!(file_name(Platform::Apple, "z"), "libz.dylib");
        assert_eq!(
            file_name_with_version(Platform::Apple, "z", Version::Number(1)),
            "libz.1.dylib"
        );
        assert_eq!(
            file_name_with_version(Platform::Apple, "OpenCL.framework", Version::Number(1)),
            "OpenCL.framework/OpenCL"
        );
    }

    #[test]
    fn windows_names() {
        assert_eq!(file_name(Platform::Windows, "zlib"), "zlib.dll");
        assert_eq!(
            file_name_with_version(Platform::Windows, "zlib", Version::Number(1)),
            "zlib.dll"
        );
        assert_eq!(file_name(Platform::Windows, "ZLIB1.DLL"), "ZLIB1.DLL");
        assert_eq!(
            file_name(Platform::Windows, "C:\\libs\\zlib"),
            "C:\\libs\\zlib"
        );
        assert_eq!(file_name(Platform::Windows, "libs\\zlib"), "libs\\zlib.dll");
    }

    #[test]
    fn no_version_is_plain_name() {
        for platform in [Platform::Unix, Platform::Apple, Platform::Windows] {
            for name in ["z", "SDL-1.2", "/usr/lib/libGL.so.1", "OpenCL.framework"] {
                assert_eq!(
                    file_name_with_version(platform, name, Version::None),
                    file_name(platform, name)
                );
            }
        }
    }

    #[test]
    fn version_tables() {
        let raw = [-1, 2, 1, -2, 7];
        let versions = raw.map(Version::from_raw);
        assert_eq!(
            probe_order(&versions).collect::<Vec<_>>(),
            [Version::None, Version::Number(2), Version::Number(1)]
        );
        assert_eq!(probe_order(&[]).collect::<Vec<_>>(), [Version::None]);
        assert_eq!(Version::from_raw(-7), Version::End);
        for v in raw {
            if v >= -2 {
                assert_eq!(Version::from_raw(v).to_raw(), Some(v));
            }
        }
        assert_eq!(Version::Number(i32::MAX as u32).to_raw(), Some(i32::MAX));
        assert_eq!(Version::Number(3_000_000_000).to_raw(), None);
    }
}
