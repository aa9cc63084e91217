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
use std::path::{Path, PathBuf};

use crate::util::PathExt;

/// A vertex of the dependency graph: the set of files produced or consumed
/// at one point in the pipeline.
///
/// Two `QNode`s with the same files (regardless of insertion order) are
/// the same node — identity is by value, not by when or how the node was
/// constructed.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct QNode {
    files: Vec<PathBuf>,
}

impl QNode {
    /// Builds a node from a file set, normalizing it into the canonical
    /// (sorted, deduplicated) form used for equality.
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut files: Vec<PathBuf> = files
            .into_iter()
            .map(|p| p.into().normalize())
            .collect();
        files.sort();
        files.dedup();
        QNode { files }
    }

    pub fn empty() -> Self {
        QNode { files: Vec::new() }
    }

    pub fn single<P: Into<PathBuf>>(file: P) -> Self {
        QNode {
            files: vec![file.into().normalize()],
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let path = path.normalize();
        self.files.iter().any(|f| f == &path)
    }
}

impl fmt::Display for QNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.files.as_slice() {
            [] => write!(f, "{{}}"),
            [one] => write!(f, "{}", one.display()),
            many => {
                write!(f, "{{")?;
                for (i, p) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.display())?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Debug for QNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QNode({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_regardless_of_order() {
        let a = QNode::new(vec!["b.txt", "a.txt"]);
        let b = QNode::new(vec!["a.txt", "b.txt"]);
        assert_eq!(a, b);
    }

    #[test]
    fn dedups_repeated_paths() {
        let n = QNode::new(vec!["a.txt", "a.txt"]);
        assert_eq!(n.len(), 1);
    }

    #[test]
    fn display_singleton_has_no_braces() {
        let n = QNode::single("a.txt");
        assert_eq!(n.to_string(), "a.txt");
    }
}
