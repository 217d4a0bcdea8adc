//! End-to-end compilations over small fixture installations.

use camino::{Utf8Path, Utf8PathBuf};
use mlc_archive::{Codecs, ContentHash, PackBuilder, PackCompression, PackEntryBuilder};
use mlc_compiler::{
    BsdiffPatcher, CollectingReporter, Compiler, CompilerEvent,
    CompilerSettings, DirectiveKind, ModList, PatchGenerator,
};
use mlc_vfs::{ArchiveSource, HashPath, ImageFingerprint, PerceptualHasher};
use std::io::Write;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().join("install")).unwrap();
        std::fs::create_dir_all(&root).unwrap();
        let fixture = Self { _dir: dir, root };
        fixture.write("profiles/Default/modlist.txt", b"+Rocks\r\n+Tweaks\r\n+Meshes\r\n");
        fixture
    }

    fn write(&self, path: &str, data: &[u8]) -> Utf8PathBuf {
        let path = self.root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        path
    }

    /// A download with a `.meta` sidecar pointing at a direct URL.
    fn download(&self, name: &str, data: &[u8]) -> ContentHash {
        self.write(&format!("downloads/{}", name), data);
        self.write(
            &format!("downloads/{}.meta", name),
            format!("[General]\ndirectURL=https://example.com/{}\n", name).as_bytes(),
        );
        ContentHash::of(data)
    }

    fn settings(&self) -> CompilerSettings {
        CompilerSettings {
            source: self.root.clone(),
            profile: "Default".into(),
            game: "skyrim".into(),
            name: "Fixture".into(),
            output: Some(self.root.parent().unwrap().join("out/fixture.modlist")),
            scratch: Some(self.root.parent().unwrap().join("scratch")),
            ..Default::default()
        }
    }
}

fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, data) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn pack_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = PackBuilder::new();
    for (name, _) in files {
        builder = builder.with_entry(PackEntryBuilder::new(*name, PackCompression::Zstd));
    }
    let mut cursor = std::io::Cursor::new(Vec::new());
    builder
        .build_to_writer(&mut cursor, |entry| {
            let (_, data) = files.iter().find(|(n, _)| *n == entry.path).unwrap();
            Ok(data.to_vec())
        })
        .unwrap();
    cursor.into_inner()
}

/// Uses the first eight bytes of a file as its fingerprint.
struct FirstBytes;

impl PerceptualHasher for FirstBytes {
    fn fingerprint(&self, data: &[u8]) -> Option<ImageFingerprint> {
        let head: [u8; 8] = data.get(..8)?.try_into().ok()?;
        Some(ImageFingerprint(u64::from_le_bytes(head)))
    }
}

fn texture(head: [u8; 8], tail: &[u8]) -> Vec<u8> {
    let mut data = head.to_vec();
    data.extend_from_slice(tail);
    data
}

/// Bytes of an archive entry as an installer would obtain them.
fn fetch(root: &Utf8Path, list: &ModList, path: &HashPath) -> Vec<u8> {
    let archive = list.archives.iter().find(|a| a.hash == path.hash).unwrap();
    let file = root.join("downloads").join(&archive.name);
    let codecs = Codecs::default();
    let mut bytes = codecs.extract(&file, &path.parts[0]).unwrap();
    let mut name = path.parts[0].as_str();
    for part in &path.parts[1..] {
        bytes = codecs.extract_from_bytes(name, &bytes, part).unwrap();
        name = part.as_str();
    }
    bytes
}

#[test]
fn test_exact_and_perceptual_texture_matches() {
    let fixture = Fixture::new();
    let rock = texture([0; 8], b"rock diffuse");
    let rock_n = texture([0; 8], b"rock normal");
    let archive = fixture.download(
        "A.zip",
        &zip_bytes(&[("textures/rock.dds", rock.as_slice()), ("textures/rock_n.dds", rock_n.as_slice())]),
    );

    fixture.write("Data/textures/rock.dds", &rock);
    // five differing bits: 59/64 similar
    let local_normal = texture([0x1f, 0, 0, 0, 0, 0, 0, 0], b"recompressed normal");
    fixture.write("Data/textures/rock_n.dds", &local_normal);

    let result = Compiler::new(fixture.settings())
        .with_perceptual_hasher(Some(Arc::new(FirstBytes)))
        .compile()
        .unwrap();
    let list = ModList::load_from_archive(&result.output).unwrap();

    let by_path = |to: &str| list.directives.iter().find(|d| d.to.as_str() == to).unwrap();
    assert_eq!(
        by_path("Data/textures/rock.dds").kind,
        DirectiveKind::FromArchive {
            archive_hash_path: HashPath::new(archive, vec!["textures/rock.dds".into()]),
        }
    );
    match &by_path("Data/textures/rock_n.dds").kind {
        DirectiveKind::TransformedTexture {
            archive_hash_path,
            similarity,
            ..
        } => {
            assert_eq!(
                archive_hash_path,
                &HashPath::new(archive, vec!["textures/rock_n.dds".into()])
            );
            assert!(*similarity >= 0.8);
        }
        other => panic!("expected a texture match, got {:?}", other),
    }

    assert_eq!(list.archives.len(), 1);
    assert_eq!(list.archives[0].name, "A.zip");
    match &list.archives[0].state {
        ArchiveSource::Download { primary_key, .. } => {
            assert_eq!(primary_key, "url|https://example.com/A.zip")
        }
        other => panic!("expected a download, got {:?}", other),
    }
}

#[test]
fn test_patched_file_reproduces_installed_bytes() {
    let fixture = Fixture::new();
    let original = b"[Main]\nbEnableFeature=0\niCount=10\n".repeat(8);
    let mut tweaked = original.clone();
    tweaked.extend_from_slice(b"bExtra=1\n");

    fixture.download("Tweaks 1.2.zip", &zip_bytes(&[("SKSE/Plugins/tweaks.ini", original.as_slice())]));
    fixture.write(
        "mods/Tweaks/meta.ini",
        b"[General]\ninstallationFile=C:/Downloads/Tweaks 1.2.zip\n",
    );
    fixture.write("mods/Tweaks/SKSE/Plugins/tweaks.ini", &tweaked);

    let result = Compiler::new(fixture.settings())
        .with_perceptual_hasher(None)
        .compile()
        .unwrap();
    let list = &result.modlist;

    let directive = list
        .directives
        .iter()
        .find(|d| d.to.as_str() == "mods/Tweaks/SKSE/Plugins/tweaks.ini")
        .unwrap();
    let DirectiveKind::PatchedFromArchive {
        archive_hash_path,
        patch_id,
        ..
    } = &directive.kind
    else {
        panic!("expected a patch, got {:?}", directive);
    };

    let source = fetch(&fixture.root, list, archive_hash_path);
    let patch = ModList::read_blob(&result.output, patch_id).unwrap();
    assert_eq!(BsdiffPatcher::default().apply(&source, &patch).unwrap(), tweaked);
    assert_eq!(ContentHash::of(&tweaked), directive.hash);
}

#[test]
fn test_container_rebuilds_byte_identically() {
    let fixture = Fixture::new();
    fixture.download(
        "Meshes.zip",
        &zip_bytes(&[("meshes/rock.nif", b"rock mesh".as_slice()), ("meshes/tree.nif", b"tree mesh".as_slice())]),
    );
    let container = pack_bytes(&[("meshes/tree.nif", b"tree mesh".as_slice()), ("meshes/rock.nif", b"rock mesh".as_slice())]);
    fixture.write("mods/Meshes/Meshes.pack", &container);

    let result = Compiler::new(fixture.settings())
        .with_perceptual_hasher(None)
        .compile()
        .unwrap();
    let list = &result.modlist;
    let directive = list
        .directives
        .iter()
        .find(|d| d.to.as_str() == "mods/Meshes/Meshes.pack")
        .unwrap();
    let DirectiveKind::CreateContainer { state, entries, .. } = &directive.kind else {
        panic!("expected a container, got {:?}", directive);
    };

    let rebuilt = Codecs::default()
        .build(state, &mut |entry: &str| {
            let directive = entries
                .iter()
                .find(|d| d.to.as_str().ends_with(&format!("/{}", entry)))
                .unwrap();
            Ok(fetch(&fixture.root, list, directive.archive_hash_path().unwrap()))
        })
        .unwrap();
    assert_eq!(rebuilt, container);
    assert_eq!(ContentHash::of(&rebuilt), directive.hash);

    // the per-run scratch folder is gone once compilation finishes
    let scratch = fixture.root.parent().unwrap().join("scratch");
    assert_eq!(std::fs::read_dir(scratch).unwrap().count(), 0);
}

#[test]
fn test_game_file_wins_and_unmatched_files_are_reported() {
    let fixture = Fixture::new();
    let esm = b"TES4 master data".to_vec();
    fixture.download("Unofficial Patch.zip", &zip_bytes(&[("Update.esm", esm.as_slice())]));
    let game = fixture.root.parent().unwrap().join("game");
    std::fs::create_dir_all(game.join("Data")).unwrap();
    std::fs::write(game.join("Data/Update.esm"), &esm).unwrap();

    fixture.write("mods/Rocks/Update.esm", &esm);
    fixture.write("mods/Rocks/mystery.esp", b"nobody has this");

    let reporter = Arc::new(CollectingReporter::new());
    let mut settings = fixture.settings();
    settings.game_folders.insert("skyrim".into(), game);
    let result = Compiler::new(settings)
        .with_perceptual_hasher(None)
        .with_reporter(reporter.clone())
        .compile()
        .unwrap();

    let directive = result
        .modlist
        .directives
        .iter()
        .find(|d| d.to.as_str() == "mods/Rocks/Update.esm")
        .unwrap();
    let hash_path = directive.archive_hash_path().unwrap();
    let archive = result
        .modlist
        .archives
        .iter()
        .find(|a| a.hash == hash_path.hash)
        .unwrap();
    assert_eq!(archive.name, "Data/Update.esm");

    assert_eq!(result.unresolved.len(), 1);
    assert_eq!(result.unresolved[0].to.as_str(), "mods/Rocks/mystery.esp");
    let unresolved_events: Vec<_> = reporter
        .events()
        .into_iter()
        .filter(|e| matches!(e, CompilerEvent::Unresolved { .. }))
        .collect();
    assert_eq!(unresolved_events.len(), 1);
}

#[test]
fn test_container_with_a_new_entry_keeps_its_matches() {
    let fixture = Fixture::new();
    let archive = fixture.download("Meshes.zip", &zip_bytes(&[("meshes/rock.nif", b"rock mesh".as_slice())]));
    let container = pack_bytes(&[("meshes/rock.nif", b"rock mesh".as_slice()), ("meshes/new.nif", b"brand new".as_slice())]);
    fixture.write("mods/Meshes/Meshes.pack", &container);

    let result = Compiler::new(fixture.settings())
        .with_perceptual_hasher(None)
        .compile()
        .unwrap();
    assert!(result.unresolved.is_empty());

    let directive = result
        .modlist
        .directives
        .iter()
        .find(|d| d.to.as_str() == "mods/Meshes/Meshes.pack")
        .unwrap();
    let DirectiveKind::CreateContainer { entries, .. } = &directive.kind else {
        panic!("expected a container, got {:?}", directive);
    };
    assert_eq!(
        entries[0].kind,
        DirectiveKind::FromArchive {
            archive_hash_path: HashPath::new(archive, vec!["meshes/rock.nif".into()]),
        }
    );
    let DirectiveKind::InlineFile { source_data_id } = &entries[1].kind else {
        panic!("expected the new entry inline, got {:?}", entries[1]);
    };
    assert_eq!(ModList::read_blob(&result.output, source_data_id).unwrap(), b"brand new");
}
