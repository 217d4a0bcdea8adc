//! Installation-relative paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A path relative to the installation root.
///
/// Always uses forward slashes and keeps the original case. Helpers that
/// compare folders, names or extensions do so case-insensitively, because the
/// installations being compiled live on case-insensitive file systems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path.as_ref().replace('\\', "/");
        Self(normalized.trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, child: impl AsRef<str>) -> Self {
        if self.0.is_empty() {
            return Self::new(child);
        }
        Self::new(format!("{}/{}", self.0, child.as_ref()))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The `index`-th segment, if any.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments().nth(index)
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Whether the path lies inside the folder `prefix`.
    pub fn in_folder(&self, prefix: &str) -> bool {
        let prefix = prefix.replace('\\', "/");
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return true;
        }
        self.0.as_bytes().get(prefix.len()) == Some(&b'/')
            && self
                .0
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }

    /// Case-insensitive substring test.
    pub fn contains_ignore_case(&self, fragment: &str) -> bool {
        let fragment = fragment.replace('\\', "/").to_ascii_lowercase();
        self.0.to_ascii_lowercase().contains(&fragment)
    }

    /// The path below `prefix`, if the path lies inside it.
    pub fn strip_folder(&self, prefix: &str) -> Option<RelativePath> {
        if !self.in_folder(prefix) {
            return None;
        }
        let prefix = prefix.replace('\\', "/");
        let len = prefix.trim_matches('/').len();
        Some(Self::new(&self.0[len + 1..]))
    }

    /// For `mods/<name>/...`, the mod name.
    pub fn mod_name(&self) -> Option<&str> {
        self.named_child(crate::consts::MODS_FOLDER)
    }

    /// For `profiles/<name>/...`, the profile name.
    pub fn profile_name(&self) -> Option<&str> {
        self.named_child(crate::consts::PROFILES_FOLDER)
    }

    fn named_child(&self, folder: &str) -> Option<&str> {
        let mut segments = self.segments();
        let first = segments.next()?;
        if !first.eq_ignore_ascii_case(folder) {
            return None;
        }
        let name = segments.next()?;
        // `mods/file.txt` is not inside a mod
        segments.next().map(|_| name)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelativePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
