use super::{PackArchive, PackBuilder, PACK_MAGIC};
use crate::codec::{ArchiveCodec, ContainerState, EntryProvider, EntryVisitor, ReadSeek};
use crate::error::Result;
use std::io::Cursor;

/// Read/write codec for pack containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackCodec;

impl PackCodec {
    pub const NAME: &'static str = "pack";
}

impl ArchiveCodec for PackCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn matches_signature(&self, header: &[u8]) -> bool {
        header.starts_with(&PACK_MAGIC)
    }

    fn for_each_entry(&self, reader: &mut dyn ReadSeek, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let mut pack = PackArchive::mount_from_reader(reader)?;
        for index in 0..pack.entries().len() {
            let path = pack.entry_path(index).unwrap_or_default().to_string();
            let data = pack.load_entry_at(index)?;
            visit(&path, &data)?;
        }
        Ok(())
    }

    fn extract(&self, reader: &mut dyn ReadSeek, entry_path: &str) -> Result<Vec<u8>> {
        let mut pack = PackArchive::mount_from_reader(reader)?;
        pack.load_entry(&crate::codec::normalize_entry_path(entry_path))
    }

    fn read_state(&self, reader: &mut dyn ReadSeek) -> Result<Option<ContainerState>> {
        let pack = PackArchive::mount_from_reader(reader)?;
        Ok(Some(ContainerState::Pack(pack.state())))
    }

    fn build(&self, state: &ContainerState, provide: &mut EntryProvider<'_>) -> Result<Vec<u8>> {
        let ContainerState::Pack(state) = state;
        tracing::debug!("Rebuilding pack with {} entries", state.entries.len());

        let mut cursor = Cursor::new(Vec::new());
        PackBuilder::from_state(state).build_to_writer(&mut cursor, |entry| provide(&entry.path))?;
        Ok(cursor.into_inner())
    }

    fn supports_rebuild(&self) -> bool {
        true
    }
}
