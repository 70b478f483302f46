//! Shared scaffolding for the integration tests: builds a minimal
//! well-formed `MURMUR01` resource image in memory (§6 "Resource file
//! format") so scenarios can exercise `load_resource` without any real
//! linguistic knowledge-base content, and a thin `Cursor`-backed
//! `ResourceSource`.

use std::io::Cursor;

use murmur::item::KbId;

const MAGIC: &[u8; 8] = b"MURMUR01";

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

/// Builds a resource image with no foreign header and no header fields:
/// `MAGIC | u16 field_count=0 | u16 entry_count | entries... | kb bytes...`.
pub fn build_resource_bytes(kbs: &[(KbId, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(kbs.len() as u16).to_le_bytes());

    let dir_len: usize = kbs
        .iter()
        .map(|(_, bytes)| 1 + 4 + 4 + 1 + name_for(bytes.len()).len())
        .sum();
    let data_start = MAGIC.len() + 2 + 2 + dir_len;

    let mut dir = Vec::new();
    let mut data = Vec::new();
    let mut offset = data_start as u32;
    for (id, bytes) in kbs {
        let name = name_for(bytes.len());
        dir.push(kb_id_byte(*id));
        dir.extend_from_slice(&offset.to_le_bytes());
        dir.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        dir.push(name.len() as u8);
        dir.extend_from_slice(name.as_bytes());
        data.extend_from_slice(bytes);
        offset += bytes.len() as u32;
    }
    out.extend_from_slice(&dir);
    out.extend_from_slice(&data);
    out
}

fn name_for(len: usize) -> String {
    format!("kb{len}")
}

pub fn resource_cursor(kbs: &[(KbId, &[u8])]) -> Cursor<Vec<u8>> {
    Cursor::new(build_resource_bytes(kbs))
}

/// Minimal dense-layout PDF codebook bytes (one vector, `ceporder = 1`,
/// no voicing byte), mirroring `murmur::smoother::codebook`'s on-disk
/// layout well enough to satisfy `create_voice`'s mandatory-kb check
/// (§4.4). Kept independent of that module for the same reason
/// `build_resource_bytes` above duplicates `resource.rs`'s layout: the
/// library's `#[cfg(test)]` helpers aren't visible to this integration
/// test binary.
fn minimal_dense_codebook_bytes() -> Vec<u8> {
    const DENSE: u8 = 0xFF;
    let ceporder: u8 = 1;
    let mean: i16 = 10;
    let ivar: u8 = 4;
    let mut out = vec![ceporder, 1, 8, 8, 2, 2, 2, DENSE];
    out.push(1); // voiced
    for _ in 0..3 {
        // static, delta, delta2 means, one coefficient each
        out.extend_from_slice(&mean.to_le_bytes());
    }
    out.push(ivar);
    out.push(ivar);
    out.push(ivar);
    out
}

/// Builds a resource image carrying only the two mandatory codebooks
/// (`Updflfz`/`Updfmgc`), for tests that need `create_voice` to succeed
/// without caring about real codebook content.
pub fn minimal_codebook_resource_bytes() -> Vec<u8> {
    let lfz = minimal_dense_codebook_bytes();
    let mgc = minimal_dense_codebook_bytes();
    build_resource_bytes(&[(KbId::Updflfz, &lfz), (KbId::Updfmgc, &mgc)])
}
