//! Output file names for exported sheets.
//!
//! Sheet names come from the document and are not trusted as file names.
//! [`sanitize`] makes them safe, and [`TargetNamer`] guarantees no two
//! sheets of one run share a target.

use std::collections::HashSet;
use std::path::PathBuf;

/// How output files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// `<sanitized sheet name>.csv`
    #[default]
    ByName,
    /// `sheet-<N>.csv`, N counting from 1.
    ByIndex,
}

pub const EXTENSION: &str = "csv";

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace path separators, reserved characters and control characters with
/// `_`, then trim surrounding whitespace and trailing dots. May return an
/// empty string.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    replaced
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Fallback stem for the sheet at 0-based `index`.
pub fn index_stem(index: usize) -> String {
    format!("sheet-{}", index + 1)
}

/// Assigns each sheet of one run its export target.
#[derive(Debug)]
pub struct TargetNamer {
    dir: PathBuf,
    policy: NamePolicy,
    /// Lowercased stems already handed out.
    taken: HashSet<String>,
}

impl TargetNamer {
    pub fn new(dir: impl Into<PathBuf>, policy: NamePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            taken: HashSet::new(),
        }
    }

    /// Target path for the sheet at `index` named `name`.
    pub fn target(&mut self, index: usize, name: &str) -> PathBuf {
        let stem = match self.policy {
            NamePolicy::ByIndex => index_stem(index),
            NamePolicy::ByName => {
                let clean = sanitize(name);
                if clean.is_empty() || clean == "." || clean == ".." {
                    index_stem(index)
                } else {
                    clean
                }
            }
        };
        let stem = self.claim(stem, index);
        self.dir.join(format!("{stem}.{EXTENSION}"))
    }

    /// Case-insensitive so that targets stay distinct on case-folding
    /// filesystems too.
    fn claim(&mut self, stem: String, index: usize) -> String {
        if self.taken.insert(stem.to_lowercase()) {
            return stem;
        }
        let mut n = index + 1;
        loop {
            let candidate = format!("{stem}-{n}");
            if self.taken.insert(candidate.to_lowercase()) {
                tracing::warn!("sheet name {stem:?} already used; writing {candidate}.{EXTENSION}");
                return candidate;
            }
            n += 1;
        }
    }
}
