// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256 as Sha256Impl};

pub trait PathExt {
    /// Returns a normalized path. This does not touch the file system at all.
    fn normalize(&self) -> PathBuf;
}

impl PathExt for Path {
    fn normalize(&self) -> PathBuf {
        let mut new_path = PathBuf::new();

        for c in self.components() {
            match c {
                Component::CurDir => {}
                Component::ParentDir => {
                    let pop = match new_path.components().next_back() {
                        Some(Component::Prefix(_))
                        | Some(Component::RootDir) => true,
                        Some(Component::Normal(s)) => !s.is_empty(),
                        _ => false,
                    };

                    if pop {
                        new_path.pop();
                    } else {
                        new_path.push("..");
                    }
                }
                _ => new_path.push(c.as_os_str()),
            }
        }

        if new_path.as_os_str().is_empty() {
            new_path.push(".");
        }

        new_path
    }
}

/// A content fingerprint. Computed fresh from file bytes every time it's
/// needed; nothing about it is ever persisted to disk between invocations.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    inner: [u8; 32],
}

impl Fingerprint {
    pub fn from_reader<R>(mut reader: R) -> io::Result<Fingerprint>
    where
        R: io::Read,
    {
        let mut hasher = Sha256Impl::default();

        let mut buf = [0u8; 16384];

        loop {
            let n = reader.read(&mut buf)?;

            if n == 0 {
                break;
            }

            hasher.input(&buf[0..n]);
        }

        let mut inner = [0u8; 32];
        inner.copy_from_slice(hasher.result().as_slice());

        Ok(Fingerprint { inner })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Fingerprint> {
        Self::from_reader(fs::File::open(path.as_ref())?)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.inner))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            Path::new("a/./b/../c").normalize(),
            PathBuf::from("a/c")
        );
    }

    #[test]
    fn normalize_keeps_leading_parent() {
        assert_eq!(Path::new("../a/b").normalize(), PathBuf::from("../a/b"));
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = Fingerprint::from_reader(&b"hello world"[..]).unwrap();
        let b = Fingerprint::from_reader(&b"hello world"[..]).unwrap();
        let c = Fingerprint::from_reader(&b"goodbye"[..]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
