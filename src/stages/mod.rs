//! The linguistic/acoustic stages of the pipeline (§4.9) plus the
//! tokenizer (§4.7) and the signal-generator stand-in (SPEC_FULL §4.10).
//!
//! Each module here is a self-contained [`crate::pu::ProcessingUnit`].
//! None of them carries real linguistic data (lexica, FSTs, decision
//! trees, PDF codebooks are knowledge-base content and explicitly out of
//! scope per `spec.md` §1); each ships a small deterministic built-in
//! stand-in so the step/item contract is fully exercisable end to end.

pub mod accent_phrasing;
pub mod phonetic_acoustic;
pub mod preproc;
pub mod sentence_analysis;
pub mod sentence_phonemes;
pub mod signal_gen;
pub mod tokenizer;
pub mod word_analysis;

/// Part-of-speech code space used by `word_analysis`/`sentence_analysis`/
/// `accent_phrasing`. A closed, tiny enumeration stands in for the
/// resource-driven POS tag set (§3 "Resource").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    Noun = 0,
    Verb = 1,
    Adjective = 2,
    Adverb = 3,
    Other = 4,
}

impl Pos {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Pos::Noun,
            1 => Pos::Verb,
            2 => Pos::Adjective,
            3 => Pos::Adverb,
            _ => Pos::Other,
        }
    }
}
