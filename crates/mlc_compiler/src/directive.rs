//! Directives: how the installer regenerates each file.

use crate::path::RelativePath;
use mlc_archive::{ContainerState, ContentHash};
use mlc_vfs::{HashPath, ImageFingerprint};
use serde::{Deserialize, Serialize};

/// The resolved outcome for one source file.
///
/// Serialized flat, with the variant named by a `$type` field:
///
/// ```json
/// {
///   "to": "mods/SkyUI/interface/skyui.swf",
///   "hash": "ba7816bf...",
///   "size": 1024,
///   "$type": "FromArchive",
///   "archiveHashPath": { "hash": "0c4f9e...", "parts": ["interface/skyui.swf"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    /// Target path relative to the installation root.
    pub to: RelativePath,
    pub hash: ContentHash,
    pub size: u64,
    #[serde(flatten)]
    pub kind: DirectiveKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum DirectiveKind {
    /// Excluded from the mod list on purpose.
    IgnoredDirectly { reason: String },

    /// Nothing could resolve the file.
    NoMatch { reason: String },

    /// The bytes ship inside the mod-list archive.
    #[serde(rename_all = "camelCase")]
    InlineFile { source_data_id: String },

    /// A config file with installation paths replaced by placeholder tokens.
    #[serde(rename_all = "camelCase")]
    RemappedInlineFile { source_data_id: String },

    #[serde(rename_all = "camelCase")]
    FromArchive { archive_hash_path: HashPath },

    #[serde(rename_all = "camelCase")]
    PatchedFromArchive {
        archive_hash_path: HashPath,
        from_hash: ContentHash,
        patch_id: String,
    },

    /// A perceptually equivalent texture taken from an archive.
    #[serde(rename_all = "camelCase")]
    TransformedTexture {
        archive_hash_path: HashPath,
        similarity: f32,
        fingerprint: ImageFingerprint,
    },

    /// A game container rebuilt from per-entry directives.
    #[serde(rename_all = "camelCase")]
    CreateContainer {
        temp_id: String,
        state: ContainerState,
        entries: Vec<Directive>,
    },
}

impl Directive {
    pub fn new(to: RelativePath, hash: ContentHash, size: u64, kind: DirectiveKind) -> Self {
        Self { to, hash, size, kind }
    }

    /// Variant name, as written to the `$type` field.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            DirectiveKind::IgnoredDirectly { .. } => "IgnoredDirectly",
            DirectiveKind::NoMatch { .. } => "NoMatch",
            DirectiveKind::InlineFile { .. } => "InlineFile",
            DirectiveKind::RemappedInlineFile { .. } => "RemappedInlineFile",
            DirectiveKind::FromArchive { .. } => "FromArchive",
            DirectiveKind::PatchedFromArchive { .. } => "PatchedFromArchive",
            DirectiveKind::TransformedTexture { .. } => "TransformedTexture",
            DirectiveKind::CreateContainer { .. } => "CreateContainer",
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self.kind, DirectiveKind::IgnoredDirectly { .. })
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self.kind, DirectiveKind::NoMatch { .. })
    }

    /// Whether the directive belongs in the manifest.
    pub fn is_installable(&self) -> bool {
        !self.is_ignored() && !self.is_no_match()
    }

    /// Reason text of ignored and unmatched directives.
    pub fn reason(&self) -> Option<&str> {
        match &self.kind {
            DirectiveKind::IgnoredDirectly { reason } | DirectiveKind::NoMatch { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }

    /// Archive location referenced by the directive, if any.
    pub fn archive_hash_path(&self) -> Option<&HashPath> {
        match &self.kind {
            DirectiveKind::FromArchive { archive_hash_path }
            | DirectiveKind::PatchedFromArchive { archive_hash_path, .. }
            | DirectiveKind::TransformedTexture { archive_hash_path, .. } => Some(archive_hash_path),
            _ => None,
        }
    }

    /// Blob ids referenced by the directive and, for containers, by its entries.
    pub fn blob_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_blob_ids(&mut ids);
        ids
    }

    fn collect_blob_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match &self.kind {
            DirectiveKind::InlineFile { source_data_id }
            | DirectiveKind::RemappedInlineFile { source_data_id } => ids.push(source_data_id),
            DirectiveKind::PatchedFromArchive { patch_id, .. } => ids.push(patch_id),
            DirectiveKind::CreateContainer { entries, .. } => {
                for entry in entries {
                    entry.collect_blob_ids(ids);
                }
            }
            _ => {}
        }
    }

    /// Every archive hash path referenced, including those of container entries.
    pub fn archive_hash_paths(&self) -> Vec<&HashPath> {
        match &self.kind {
            DirectiveKind::CreateContainer { entries, .. } => {
                entries.iter().flat_map(|e| e.archive_hash_paths()).collect()
            }
            _ => self.archive_hash_path().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: DirectiveKind) -> Directive {
        Directive::new(
            RelativePath::new("mods/A/a.txt"),
            ContentHash::of(b"a"),
            1,
            kind,
        )
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let directive = sample(DirectiveKind::InlineFile {
            source_data_id: "abc".into(),
        });
        let json = serde_json::to_value(&directive).unwrap();
        assert_eq!(json["$type"], "InlineFile");
        assert_eq!(json["sourceDataId"], "abc");
        assert_eq!(json["to"], "mods/A/a.txt");
        assert_eq!(json["size"], 1);

        let back: Directive = serde_json::from_value(json).unwrap();
        assert_eq!(back, directive);
    }

    #[test]
    fn test_nested_container_directive_parses() {
        let entry = sample(DirectiveKind::FromArchive {
            archive_hash_path: HashPath::new(ContentHash::of(b"zip"), vec!["a.txt".into()]),
        });
        let container = sample(DirectiveKind::CreateContainer {
            temp_id: "t".into(),
            state: ContainerState::Pack(Default::default()),
            entries: vec![entry.clone()],
        });

        let json = serde_json::to_string(&container).unwrap();
        let back: Directive = serde_json::from_str(&json).unwrap();
        assert_eq!(back, container);
        assert_eq!(back.archive_hash_paths(), vec![entry.archive_hash_path().unwrap()]);
    }

    #[test]
    fn test_blob_ids_include_container_entries() {
        let patched = sample(DirectiveKind::PatchedFromArchive {
            archive_hash_path: HashPath::archive(ContentHash::of(b"zip")),
            from_hash: ContentHash::of(b"old"),
            patch_id: "old_new".into(),
        });
        let container = sample(DirectiveKind::CreateContainer {
            temp_id: "t".into(),
            state: ContainerState::Pack(Default::default()),
            entries: vec![
                patched,
                sample(DirectiveKind::InlineFile {
                    source_data_id: "blob".into(),
                }),
            ],
        });
        assert_eq!(container.blob_ids(), vec!["old_new", "blob"]);
    }

    #[test]
    fn test_installable() {
        let ignored = sample(DirectiveKind::IgnoredDirectly {
            reason: "logs".into(),
        });
        assert!(!ignored.is_installable());
        assert_eq!(ignored.reason(), Some("logs"));
        assert_eq!(ignored.type_name(), "IgnoredDirectly");
    }
}
