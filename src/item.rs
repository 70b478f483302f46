//! The universal currency between pipeline stages.
//!
//! Wire format: `u8 type | u8 info1 | u8 info2 | u8 length | length bytes
//! payload`. Multi-byte integers inside a payload are little-endian.

/// Maximum payload length; `length` is one octet.
pub const MAX_PAYLOAD: usize = 255;
/// Size of an item header in bytes.
pub const HEADER_LEN: usize = 4;

/// The enumerated `type` octet. Unknown values may still appear "in
/// transit" through a stage that forwards items unchanged; such items
/// carry `type_byte` outside this enum and `kind()` returns `None` for
/// them rather than panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    WordSeqGraph = 0,
    Token = 1,
    WordGraph = 2,
    WordIndex = 3,
    WordPhon = 4,
    SyllPhon = 5,
    Bound = 6,
    Punc = 7,
    Cmd = 8,
    Phone = 9,
    Frame = 10,
    FramePar = 11,
    Other = 12,
    Err = 13,
}

impl ItemType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::WordSeqGraph,
            1 => Self::Token,
            2 => Self::WordGraph,
            3 => Self::WordIndex,
            4 => Self::WordPhon,
            5 => Self::SyllPhon,
            6 => Self::Bound,
            7 => Self::Punc,
            8 => Self::Cmd,
            9 => Self::Phone,
            10 => Self::Frame,
            11 => Self::FramePar,
            12 => Self::Other,
            13 => Self::Err,
            _ => return None,
        })
    }
}

/// `Cmd` item subtype: which markup command was recognized. Carried in
/// `info1`; recovered from `original_source/pico/lib/picodata.h`'s
/// `PICO_ITEM_CMD` kind table, dropped by the distilled spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdKind {
    Volume,
    Pitch,
    Speed,
    Speaker,
    Voice,
    Preprocontext,
    Mark,
    Play,
    Usesig,
    Genfile,
    Sentence,
    Paragraph,
    Break,
    Spell,
    Phoneme,
    Item,
    Ignore,
    Flush,
}

impl CmdKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        use CmdKind::*;
        Some(match v {
            0 => Volume,
            1 => Pitch,
            2 => Speed,
            3 => Speaker,
            4 => Voice,
            5 => Preprocontext,
            6 => Mark,
            7 => Play,
            8 => Usesig,
            9 => Genfile,
            10 => Sentence,
            11 => Paragraph,
            12 => Break,
            13 => Spell,
            14 => Phoneme,
            15 => Item,
            16 => Ignore,
            17 => Flush,
            _ => return None,
        })
    }
}

/// `Cmd` item phase: `info2` for paired tags like `<speed>...</speed>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdPhase {
    Start,
    End,
}

/// Knowledge-base id, a fixed small enumeration (`picoknow.h`'s
/// `PICO_KB_ID_*` table), dropped by the distilled spec but needed to give
/// the resource directory (§4.4) a closed id space instead of raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KbId {
    Utpp,
    Usca,
    Uwgr,
    Upos,
    Uphr,
    Ufst,
    Ucod,
    Utrans,
    Uaccent,
    Ulex,
    Utok,
    Udt,
    Updflfz,
    Updfmgc,
}

impl KbId {
    pub fn from_u8(v: u8) -> Option<Self> {
        use KbId::*;
        Some(match v {
            0 => Utpp,
            1 => Usca,
            2 => Uwgr,
            3 => Upos,
            4 => Uphr,
            5 => Ufst,
            6 => Ucod,
            7 => Utrans,
            8 => Uaccent,
            9 => Ulex,
            10 => Utok,
            11 => Udt,
            12 => Updflfz,
            13 => Updfmgc,
            _ => return None,
        })
    }
}

/// One self-delimiting item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub type_byte: u8,
    pub info1: u8,
    pub info2: u8,
    pub payload: Vec<u8>,
}

impl Item {
    pub fn new(kind: ItemType, info1: u8, info2: u8, payload: Vec<u8>) -> Option<Self> {
        if payload.len() > MAX_PAYLOAD {
            return None;
        }
        Some(Self {
            type_byte: kind as u8,
            info1,
            info2,
            payload,
        })
    }

    pub fn kind(&self) -> Option<ItemType> {
        ItemType::from_u8(self.type_byte)
    }

    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serializes the header and payload contiguously into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.type_byte);
        out.push(self.info1);
        out.push(self.info2);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
    }

    /// Decodes one item from the front of `buf`, returning the item and the
    /// number of bytes consumed, or `None` if `buf` does not hold a
    /// complete header+payload.
    pub fn decode(buf: &[u8]) -> Option<(Item, usize)> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let length = buf[3] as usize;
        if buf.len() < HEADER_LEN + length {
            return None;
        }
        let item = Item {
            type_byte: buf[0],
            info1: buf[1],
            info2: buf[2],
            payload: buf[HEADER_LEN..HEADER_LEN + length].to_vec(),
        };
        Some((item, HEADER_LEN + length))
    }
}

/// `Bound` item strength, carried in `info1` (§4.9 accentuation/phrasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStrength {
    SBeg,
    SEnd,
    Term,
    Phr1,
    Phr2,
    Phr3,
}

impl BoundStrength {
    pub fn from_u8(v: u8) -> Option<Self> {
        use BoundStrength::*;
        Some(match v {
            0 => SBeg,
            1 => SEnd,
            2 => Term,
            3 => Phr1,
            4 => Phr2,
            5 => Phr3,
            _ => return None,
        })
    }

    /// Whether this bound closes a sentence, per the cepstral smoother's
    /// "sentence-terminating bound" trigger (§4.8).
    pub fn terminates_sentence(self) -> bool {
        matches!(self, BoundStrength::SEnd | BoundStrength::Term)
    }
}

/// `Bound` item type, carried in `info2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundType {
    P,
    T,
    Q,
    E,
}

impl BoundType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use BoundType::*;
        Some(match v {
            0 => P,
            1 => T,
            2 => Q,
            3 => E,
            _ => return None,
        })
    }
}

/// Builds a `Bound` item.
pub fn bound_item(strength: BoundStrength, kind: BoundType) -> Item {
    Item::new(ItemType::Bound, strength as u8, kind as u8, Vec::new())
        .expect("bound items carry no payload")
}

/// One phone state's contribution: how many output frames it spans and
/// which codebook vectors parameterize it (§4.8 "Codebook layout").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneState {
    pub frames: u8,
    pub lfz_index: u16,
    pub mgc_index: u16,
}

const PHONE_STATE_WIRE_LEN: usize = 5; // frames:u8 + lfz_index:u16 + mgc_index:u16

/// Builds a `Phone` item: `info1` = phone id, `info2` = number of states,
/// payload = one [`PHONE_STATE_WIRE_LEN`]-byte record per state.
pub fn phone_item(phone_id: u8, states: &[PhoneState]) -> Option<Item> {
    let mut payload = Vec::with_capacity(states.len() * PHONE_STATE_WIRE_LEN);
    for s in states {
        payload.push(s.frames);
        payload.extend_from_slice(&s.lfz_index.to_le_bytes());
        payload.extend_from_slice(&s.mgc_index.to_le_bytes());
    }
    Item::new(ItemType::Phone, phone_id, states.len() as u8, payload)
}

/// Reads back the states packed by [`phone_item`].
pub fn phone_states(item: &Item) -> Vec<PhoneState> {
    let mut out = Vec::with_capacity(item.info2 as usize);
    let mut pos = 0;
    while pos + PHONE_STATE_WIRE_LEN <= item.payload.len() {
        let frames = item.payload[pos];
        let lfz_index = u16::from_le_bytes([item.payload[pos + 1], item.payload[pos + 2]]);
        let mgc_index = u16::from_le_bytes([item.payload[pos + 3], item.payload[pos + 4]]);
        out.push(PhoneState {
            frames,
            lfz_index,
            mgc_index,
        });
        pos += PHONE_STATE_WIRE_LEN;
    }
    out
}

/// One smoothed output frame's F0 triple, per coefficient (§4.8: "for each
/// of `lfz_ceporder` coefficients a triple `(f0, voicing_flag,
/// f0_redundant_copy)`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F0Triple {
    pub f0: i16,
    pub voiced: bool,
    pub f0_copy: i16,
}

/// Builds a `FramePar` item: `phone_id`, the LFZ triples, the MGC
/// coefficients, then the final `mgc_index` (§4.8).
pub fn frame_par_item(
    phone_id: u8,
    lfz: &[F0Triple],
    mgc: &[i16],
    mgc_index: u16,
) -> Option<Item> {
    let mut payload = Vec::with_capacity(1 + lfz.len() * 5 + mgc.len() * 2 + 2);
    payload.push(phone_id);
    for t in lfz {
        payload.extend_from_slice(&t.f0.to_le_bytes());
        payload.push(t.voiced as u8);
        payload.extend_from_slice(&t.f0_copy.to_le_bytes());
    }
    for c in mgc {
        payload.extend_from_slice(&c.to_le_bytes());
    }
    payload.extend_from_slice(&mgc_index.to_le_bytes());
    Item::new(ItemType::FramePar, 0, 0, payload)
}

/// Decodes a `FramePar` payload built by [`frame_par_item`], given the
/// LFZ/MGC coefficient counts the voice's codebooks declare.
pub fn frame_par_fields(
    item: &Item,
    lfz_ceporder: usize,
    mgc_ceporder: usize,
) -> Option<(u8, Vec<F0Triple>, Vec<i16>, u16)> {
    let payload = &item.payload;
    let mut pos = 0;
    let phone_id = *payload.get(pos)?;
    pos += 1;
    let mut lfz = Vec::with_capacity(lfz_ceporder);
    for _ in 0..lfz_ceporder {
        let f0 = i16::from_le_bytes([*payload.get(pos)?, *payload.get(pos + 1)?]);
        let voiced = *payload.get(pos + 2)? != 0;
        let f0_copy = i16::from_le_bytes([*payload.get(pos + 3)?, *payload.get(pos + 4)?]);
        lfz.push(F0Triple { f0, voiced, f0_copy });
        pos += 5;
    }
    let mut mgc = Vec::with_capacity(mgc_ceporder);
    for _ in 0..mgc_ceporder {
        mgc.push(i16::from_le_bytes([*payload.get(pos)?, *payload.get(pos + 1)?]));
        pos += 2;
    }
    let mgc_index = u16::from_le_bytes([*payload.get(pos)?, *payload.get(pos + 1)?]);
    Some((phone_id, lfz, mgc, mgc_index))
}
