//! Resource loading and voice assembly (§4.4).
//!
//! A resource is referenced by `{manager, voice-definitions, voices}`; we
//! model that with a reference count on each loaded [`Resource`], per the
//! "resource ownership" design note — a resource refuses to unload while
//! the count exceeds zero.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use crate::arena::Arena;
use crate::error::MurmurError;
use crate::item::KbId;

/// Anything byte-addressable and seekable can be a resource source — a
/// `File`, a `Cursor<Vec<u8>>` in tests, or a caller-supplied reader.
/// File I/O itself stays outside this crate's concern (§1 Non-goals); this
/// trait is the seam between that and the format this module parses.
pub trait ResourceSource: Read + Seek {}
impl<T: Read + Seek> ResourceSource for T {}

const MAGIC: &[u8; 8] = b"MURMUR01";
const MAX_FOREIGN_HEADER: usize = 64;

/// An opaque byte range inside a loaded resource's arena storage, plus its
/// id. Parsing the range into a typed sub-object is the linguistic
/// stages' concern, not this module's (§1 Non-goals: knowledge-base
/// content is out of scope).
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeBase {
    pub id: KbId,
    pub arena_off: usize,
    pub len: usize,
}

struct DirEntry {
    kb_id: u8,
    offset: u32,
    size: u32,
    name: String,
}

/// A loaded resource file.
pub struct Resource {
    pub name: String,
    lock_count: u32,
    kbs: Vec<KnowledgeBase>,
}

impl Resource {
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    pub fn knowledge_bases(&self) -> &[KnowledgeBase] {
        &self.kbs
    }
}

/// A fixed-size, id-indexed table of knowledge bases plus the resource
/// names that contributed them, assembled by `create_voice`.
pub struct Voice {
    pub name: String,
    kb_table: [Option<KnowledgeBase>; 14],
    resource_names: Vec<String>,
}

impl Voice {
    pub fn kb(&self, id: KbId) -> Option<&KnowledgeBase> {
        self.kb_table[kb_index(id)].as_ref()
    }

    pub fn resource_names(&self) -> &[String] {
        &self.resource_names
    }
}

fn kb_index(id: KbId) -> usize {
    use KbId::*;
    match id {
        Utpp => 0,
        Usca => 1,
        Uwgr => 2,
        Upos => 3,
        Uphr => 4,
        Ufst => 5,
        Ucod => 6,
        Utrans => 7,
        Uaccent => 8,
        Ulex => 9,
        Utok => 10,
        Udt => 11,
        Updflfz => 12,
        Updfmgc => 13,
    }
}

/// Loaded resources plus the static voice-name → resource-name-list map.
/// Voice-name comparison is byte-for-byte and case-sensitive, per the
/// "observed oddity" the source never documents but always relies on.
#[derive(Default)]
pub struct ResourceManager {
    resources: Vec<Resource>,
    voice_defs: HashMap<String, Vec<String>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and loads one resource from `source`, allocating its
    /// knowledge-base byte ranges out of `arena`.
    pub fn load_resource(
        &mut self,
        name: &str,
        source: &mut dyn ResourceSource,
        arena: &mut Arena,
    ) -> Result<(), MurmurError> {
        if self.resources.iter().any(|r| r.name == name) {
            return Err(MurmurError::FileCorrupt(format!(
                "duplicate resource name: {name}"
            )));
        }

        let total_len = source
            .seek(SeekFrom::End(0))
            .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;

        let mut prefix = vec![0u8; (MAX_FOREIGN_HEADER + MAGIC.len()).min(total_len as usize)];
        source
            .read_exact(&mut prefix)
            .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
        let magic_at = prefix
            .windows(MAGIC.len())
            .position(|w| w == MAGIC)
            .ok_or(MurmurError::UnexpectedFileType)?;
        if magic_at > MAX_FOREIGN_HEADER {
            return Err(MurmurError::UnexpectedFileType);
        }

        let mut cursor = magic_at as u64 + MAGIC.len() as u64;
        let field_count = read_u16_at(source, &mut cursor)?;
        for _ in 0..field_count {
            let _key = read_u8_at(source, &mut cursor)?;
            let _value = read_u32_at(source, &mut cursor)?;
        }

        let entry_count = read_u16_at(source, &mut cursor)?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let kb_id = read_u8_at(source, &mut cursor)?;
            let offset = read_u32_at(source, &mut cursor)?;
            let size = read_u32_at(source, &mut cursor)?;
            let name_len = read_u8_at(source, &mut cursor)? as usize;
            let mut name_buf = vec![0u8; name_len];
            source
                .seek(SeekFrom::Start(cursor))
                .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
            source
                .read_exact(&mut name_buf)
                .map_err(|_| MurmurError::FileCorrupt("truncated directory entry".into()))?;
            cursor += name_len as u64;
            let entry_name = String::from_utf8(name_buf)
                .map_err(|_| MurmurError::FileCorrupt("non-utf8 kb name".into()))?;
            entries.push(DirEntry {
                kb_id,
                offset,
                size,
                name: entry_name,
            });
        }

        let mut kbs = Vec::with_capacity(entries.len());
        for e in &entries {
            let id = KbId::from_u8(e.kb_id)
                .ok_or_else(|| MurmurError::FileCorrupt(format!("unknown kb id {}", e.kb_id)))?;
            let end = e.offset as u64 + e.size as u64;
            if end > total_len {
                return Err(MurmurError::FileCorrupt(format!(
                    "kb range out of bounds: {}",
                    e.name
                )));
            }
            let mut bytes = vec![0u8; e.size as usize];
            source
                .seek(SeekFrom::Start(e.offset as u64))
                .map_err(|err| MurmurError::CantOpenFile(err.to_string()))?;
            source
                .read_exact(&mut bytes)
                .map_err(|_| MurmurError::FileCorrupt(format!("truncated kb: {}", e.name)))?;

            let arena_off = arena.allocate(bytes.len()).ok_or(MurmurError::OutOfMem)?;
            arena.payload_mut(arena_off, bytes.len()).copy_from_slice(&bytes);
            kbs.push(KnowledgeBase {
                id,
                arena_off,
                len: bytes.len(),
            });
        }

        self.resources.push(Resource {
            name: name.to_string(),
            lock_count: 0,
            kbs,
        });
        Ok(())
    }

    pub fn unload_resource(&mut self, name: &str, arena: &mut Arena) -> Result<(), MurmurError> {
        let idx = self
            .resources
            .iter()
            .position(|r| r.name == name)
            .ok_or(MurmurError::InvalidHandle)?;
        if self.resources[idx].lock_count > 0 {
            return Err(MurmurError::ResourceBusy);
        }
        let resource = self.resources.remove(idx);
        for kb in &resource.kbs {
            arena.deallocate(kb.arena_off);
        }
        Ok(())
    }

    pub fn create_voice_definition(&mut self, name: &str) -> Result<(), MurmurError> {
        if self.voice_defs.contains_key(name) {
            return Err(MurmurError::NameConflict(name.to_string()));
        }
        self.voice_defs.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn add_resource_to_voice_definition(
        &mut self,
        voice_name: &str,
        resource_name: &str,
    ) -> Result<(), MurmurError> {
        let list = self
            .voice_defs
            .get_mut(voice_name)
            .ok_or_else(|| MurmurError::NameUndefined(voice_name.to_string()))?;
        list.push(resource_name.to_string());
        Ok(())
    }

    pub fn release_voice_definition(&mut self, name: &str) {
        self.voice_defs.remove(name);
    }

    fn find_resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.name == name)
    }

    /// Looks up a loaded resource by name, for introspection (the CLI's
    /// `info` subcommand dumps a resource's directory without assembling
    /// a voice).
    pub fn find_resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn loaded_resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Knowledge bases every voice must carry: the LFZ/MGC codebooks the
    /// cepstral smoother and signal generator read directly (§4.8). Every
    /// other `KbId` backs a knowledge-base-driven stage left as a
    /// deterministic stand-in (§1 Non-goals), so only these two are
    /// actually consulted anywhere in the pipeline.
    const MANDATORY_KBS: [KbId; 2] = [KbId::Updflfz, KbId::Updfmgc];

    pub fn create_voice(&mut self, voice_name: &str) -> Result<Voice, MurmurError> {
        let resource_names = self
            .voice_defs
            .get(voice_name)
            .ok_or_else(|| MurmurError::NameUndefined(voice_name.to_string()))?
            .clone();

        let mut kb_table: [Option<KnowledgeBase>; 14] = [None; 14];
        let mut locked = Vec::with_capacity(resource_names.len());
        for rname in &resource_names {
            let resource = match self.find_resource_mut(rname) {
                Some(r) => r,
                None => {
                    self.unlock_all(&locked);
                    return Err(MurmurError::ResourceMissing(rname.clone()));
                }
            };
            resource.lock_count += 1;
            locked.push(rname.clone());
            for kb in &resource.kbs {
                kb_table[kb_index(kb.id)] = Some(*kb);
            }
        }

        if Self::MANDATORY_KBS
            .iter()
            .any(|id| kb_table[kb_index(*id)].is_none())
        {
            self.unlock_all(&locked);
            return Err(MurmurError::KbMissing);
        }

        Ok(Voice {
            name: voice_name.to_string(),
            kb_table,
            resource_names,
        })
    }

    /// Undoes the lock-count increments `create_voice` applied before
    /// bailing out partway through assembly.
    fn unlock_all(&mut self, resource_names: &[String]) {
        for rname in resource_names {
            if let Some(resource) = self.find_resource_mut(rname) {
                resource.lock_count = resource.lock_count.saturating_sub(1);
            }
        }
    }

    pub fn release_voice(&mut self, voice: Voice) {
        for rname in &voice.resource_names {
            if let Some(resource) = self.find_resource_mut(rname) {
                resource.lock_count = resource.lock_count.saturating_sub(1);
            }
        }
    }
}

fn read_u8_at(source: &mut dyn ResourceSource, cursor: &mut u64) -> Result<u8, MurmurError> {
    source
        .seek(SeekFrom::Start(*cursor))
        .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
    let mut b = [0u8; 1];
    source
        .read_exact(&mut b)
        .map_err(|_| MurmurError::FileCorrupt("truncated header".into()))?;
    *cursor += 1;
    Ok(b[0])
}

fn read_u16_at(source: &mut dyn ResourceSource, cursor: &mut u64) -> Result<u16, MurmurError> {
    source
        .seek(SeekFrom::Start(*cursor))
        .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
    let mut b = [0u8; 2];
    source
        .read_exact(&mut b)
        .map_err(|_| MurmurError::FileCorrupt("truncated header".into()))?;
    *cursor += 2;
    Ok(u16::from_le_bytes(b))
}

fn read_u32_at(source: &mut dyn ResourceSource, cursor: &mut u64) -> Result<u32, MurmurError> {
    source
        .seek(SeekFrom::Start(*cursor))
        .map_err(|e| MurmurError::CantOpenFile(e.to_string()))?;
    let mut b = [0u8; 4];
    source
        .read_exact(&mut b)
        .map_err(|_| MurmurError::FileCorrupt("truncated header".into()))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(b))
}

#[cfg(test)]
pub mod test_support {
    //! Builds a minimal well-formed resource image in memory, for tests
    //! that need `load_resource` without real linguistic knowledge-base
    //! content.
    use super::*;

    pub fn build_resource_bytes(kbs: &[(KbId, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&0u16.to_le_bytes()); // no header fields

        out.extend_from_slice(&(kbs.len() as u16).to_le_bytes());
        let mut data_section = Vec::new();
        let dir_placeholder_len: usize = kbs
            .iter()
            .map(|(_, bytes)| 1 + 4 + 4 + 1 + name_for(bytes).len())
            .sum();
        let data_start = MAGIC.len() + 2 + 2 + dir_placeholder_len;
        let mut offset = data_start as u32;
        let mut dir = Vec::new();
        for (id, bytes) in kbs {
            let name = name_for(bytes);
            dir.push(kb_id_byte(*id));
            dir.extend_from_slice(&offset.to_le_bytes());
            dir.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            dir.push(name.len() as u8);
            dir.extend_from_slice(name.as_bytes());
            data_section.extend_from_slice(bytes);
            offset += bytes.len() as u32;
        }
        out.extend_from_slice(&dir);
        out.extend_from_slice(&data_section);
        out
    }

    fn name_for(bytes: &[u8]) -> String {
        format!("kb{}", bytes.len())
    }

    fn kb_id_byte(id: KbId) -> u8 {
        use KbId::*;
        match id {
            Utpp => 0,
            Usca => 1,
            Uwgr => 2,
            Upos => 3,
            Uphr => 4,
            Ufst => 5,
            Ucod => 6,
            Utrans => 7,
            Uaccent => 8,
            Ulex => 9,
            Utok => 10,
            Udt => 11,
            Updflfz => 12,
            Updfmgc => 13,
        }
    }

    /// Builds a voice definition named `voice_name` backed by a resource
    /// carrying only the two mandatory codebooks (§4.4), one vector each —
    /// enough to satisfy `create_voice`'s `KbMissing` check for stage
    /// tests that exercise `step`/`initialize` logic without caring about
    /// real codebook content. Returns the `Arena` the resource's bytes
    /// live in alongside the assembled `Voice`; callers must pass that
    /// same arena into any `ProcessingUnit` method that reads `voice.kb(..)`
    /// bytes, since `KnowledgeBase::arena_off` is only meaningful relative
    /// to the arena it was loaded into.
    pub fn minimal_voice(voice_name: &str) -> (Arena, Voice) {
        let mut arena = Arena::new(1 << 16).unwrap();
        let mut mgr = ResourceManager::new();
        let lfz = crate::smoother::codebook::test_codebook_bytes(1, 8, 8, 2, &[(10, 4)]);
        let mgc = crate::smoother::codebook::test_codebook_bytes(1, 8, 8, 2, &[(10, 4)]);
        let bytes = build_resource_bytes(&[(KbId::Updflfz, &lfz), (KbId::Updfmgc, &mgc)]);
        let mut cursor = std::io::Cursor::new(bytes);
        mgr.load_resource("codebooks", &mut cursor, &mut arena).unwrap();
        mgr.create_voice_definition(voice_name).unwrap();
        mgr.add_resource_to_voice_definition(voice_name, "codebooks").unwrap();
        let voice = mgr.create_voice(voice_name).unwrap();
        (arena, voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn load_unload_round_trips_arena_usage() {
        let mut arena = Arena::new(8192).unwrap();
        let before = arena.usage().used_bytes;
        let mut mgr = ResourceManager::new();
        let bytes = test_support::build_resource_bytes(&[(KbId::Ulex, &[1, 2, 3, 4])]);
        let mut cursor = Cursor::new(bytes);
        mgr.load_resource("r1", &mut cursor, &mut arena).unwrap();
        assert!(arena.usage().used_bytes > before);
        mgr.unload_resource("r1", &mut arena).unwrap();
        assert_eq!(arena.usage().used_bytes, before);
    }

    #[test]
    fn voice_assembly_locks_resource() {
        let mut arena = Arena::new(8192).unwrap();
        let mut mgr = ResourceManager::new();
        let lfz = crate::smoother::codebook::test_codebook_bytes(1, 8, 8, 2, &[(10, 4)]);
        let mgc = crate::smoother::codebook::test_codebook_bytes(1, 8, 8, 2, &[(10, 4)]);
        let bytes = test_support::build_resource_bytes(&[
            (KbId::Ulex, &[1, 2, 3]),
            (KbId::Updflfz, &lfz),
            (KbId::Updfmgc, &mgc),
        ]);
        let mut cursor = Cursor::new(bytes);
        mgr.load_resource("lex", &mut cursor, &mut arena).unwrap();
        mgr.create_voice_definition("en-US").unwrap();
        mgr.add_resource_to_voice_definition("en-US", "lex").unwrap();

        let voice = mgr.create_voice("en-US").unwrap();
        assert!(voice.kb(KbId::Ulex).is_some());
        assert!(matches!(
            mgr.unload_resource("lex", &mut arena),
            Err(MurmurError::ResourceBusy)
        ));
        mgr.release_voice(voice);
        mgr.unload_resource("lex", &mut arena).unwrap();
    }

    #[test]
    fn create_voice_without_mandatory_kbs_fails() {
        let mut arena = Arena::new(8192).unwrap();
        let mut mgr = ResourceManager::new();
        let bytes = test_support::build_resource_bytes(&[(KbId::Ulex, &[1, 2, 3])]);
        let mut cursor = Cursor::new(bytes);
        mgr.load_resource("lex", &mut cursor, &mut arena).unwrap();
        mgr.create_voice_definition("en-US").unwrap();
        mgr.add_resource_to_voice_definition("en-US", "lex").unwrap();

        assert!(matches!(
            mgr.create_voice("en-US"),
            Err(MurmurError::KbMissing)
        ));
        // the failed assembly must not leave the resource locked.
        mgr.unload_resource("lex", &mut arena).unwrap();
    }

    #[test]
    fn duplicate_voice_definition_name_conflict() {
        let mut mgr = ResourceManager::new();
        mgr.create_voice_definition("en-US").unwrap();
        assert!(matches!(
            mgr.create_voice_definition("en-US"),
            Err(MurmurError::NameConflict(_))
        ));
    }
}
