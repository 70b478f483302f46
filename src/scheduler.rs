//! The Control PU (§4.6): owns the nine stages and the ten rings
//! (external head, eight intermediate, external tail), dispatches one
//! stage's `step` per `tick`, and tracks focus (`cur_pu`) plus each
//! stage's `last_status` between ticks.
//!
//! Per the "dynamic dispatch" design note, stages are not `dyn
//! ProcessingUnit` trait objects; [`Stage`] is a closed sum type the
//! scheduler matches on exhaustively, keeping the whole pipeline
//! allocation-free after construction.

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::stages::accent_phrasing::AccentPhrasing;
use crate::stages::phonetic_acoustic::PhoneticAcoustic;
use crate::stages::preproc::Preproc;
use crate::stages::sentence_analysis::SentenceAnalysis;
use crate::stages::sentence_phonemes::SentencePhonemes;
use crate::stages::signal_gen::SignalGen;
use crate::stages::tokenizer::Tokenizer;
use crate::stages::word_analysis::WordAnalysis;
use crate::smoother::Smoother;

/// Number of pipeline stages (§2's "nine processing units").
pub const NUM_STAGES: usize = 9;
/// Number of rings: one per stage boundary, plus the external head/tail.
pub const NUM_RINGS: usize = NUM_STAGES + 1;

/// Per-stage ring capacities (§4.3: "text head ≈1x item, tokenizer 2x,
/// linguistic stages 2-4x, cepstral 16x, signal 16x"), expressed as a
/// multiple of the maximum wire size of one item.
const RING_CAPACITY_MULTIPLIERS: [usize; NUM_RINGS] = [1, 2, 2, 3, 3, 3, 4, 4, 16, 16];

fn max_item_wire_len() -> usize {
    crate::item::HEADER_LEN + crate::item::MAX_PAYLOAD
}

/// One pipeline stage. Matches, never boxes: see the module doc.
pub enum Stage {
    Tokenizer(Tokenizer),
    Preproc(Preproc),
    WordAnalysis(WordAnalysis),
    SentenceAnalysis(SentenceAnalysis),
    AccentPhrasing(AccentPhrasing),
    SentencePhonemes(SentencePhonemes),
    PhoneticAcoustic(PhoneticAcoustic),
    Smoother(Smoother),
    SignalGen(SignalGen),
}

impl Stage {
    fn initialize(&mut self, mode: ResetMode, voice: &Voice, arena: &Arena) {
        match self {
            Stage::Tokenizer(s) => s.initialize(mode, voice, arena),
            Stage::Preproc(s) => s.initialize(mode, voice, arena),
            Stage::WordAnalysis(s) => s.initialize(mode, voice, arena),
            Stage::SentenceAnalysis(s) => s.initialize(mode, voice, arena),
            Stage::AccentPhrasing(s) => s.initialize(mode, voice, arena),
            Stage::SentencePhonemes(s) => s.initialize(mode, voice, arena),
            Stage::PhoneticAcoustic(s) => s.initialize(mode, voice, arena),
            Stage::Smoother(s) => s.initialize(mode, voice, arena),
            Stage::SignalGen(s) => s.initialize(mode, voice, arena),
        }
    }

    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        voice: &Voice,
        arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult {
        match self {
            Stage::Tokenizer(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::Preproc(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::WordAnalysis(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::SentenceAnalysis(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::AccentPhrasing(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::SentencePhonemes(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::PhoneticAcoustic(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::Smoother(s) => s.step(cb_in, cb_out, voice, arena, diag),
            Stage::SignalGen(s) => s.step(cb_in, cb_out, voice, arena, diag),
        }
    }

    fn terminate(&mut self) {
        match self {
            Stage::Tokenizer(s) => s.terminate(),
            Stage::Preproc(s) => s.terminate(),
            Stage::WordAnalysis(s) => s.terminate(),
            Stage::SentenceAnalysis(s) => s.terminate(),
            Stage::AccentPhrasing(s) => s.terminate(),
            Stage::SentencePhonemes(s) => s.terminate(),
            Stage::PhoneticAcoustic(s) => s.terminate(),
            Stage::Smoother(s) => s.terminate(),
            Stage::SignalGen(s) => s.terminate(),
        }
    }
}

pub struct Scheduler {
    stages: [Stage; NUM_STAGES],
    rings: [CharBuffer; NUM_RINGS],
    cur_pu: usize,
    last_status: [StepResult; NUM_STAGES],
}

impl Scheduler {
    pub fn new() -> Self {
        let item_len = max_item_wire_len();
        let rings: Vec<CharBuffer> = RING_CAPACITY_MULTIPLIERS
            .iter()
            .map(|&mult| CharBuffer::new(item_len * mult))
            .collect();
        Self {
            stages: [
                Stage::Tokenizer(Tokenizer::new()),
                Stage::Preproc(Preproc::new()),
                Stage::WordAnalysis(WordAnalysis::new()),
                Stage::SentenceAnalysis(SentenceAnalysis::new()),
                Stage::AccentPhrasing(AccentPhrasing::new()),
                Stage::SentencePhonemes(SentencePhonemes::new()),
                Stage::PhoneticAcoustic(PhoneticAcoustic::new()),
                Stage::Smoother(Smoother::new()),
                Stage::SignalGen(SignalGen::new()),
            ],
            rings: rings.try_into().unwrap_or_else(|_| unreachable!()),
            cur_pu: 0,
            last_status: [StepResult::Idle; NUM_STAGES],
        }
    }

    /// Pushes raw bytes into the head ring, stopping at the first byte
    /// that would overflow it. Returns the number of bytes accepted.
    pub fn feed_text(&mut self, bytes: &[u8]) -> usize {
        let head = &mut self.rings[0];
        let mut accepted = 0;
        for &b in bytes {
            if head.put_ch(b).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Reads one payload out of the tail ring via `get_speech_data`, or
    /// `None` if the tail has no complete `Frame` item yet.
    pub fn drain_tail(&mut self, out: &mut Vec<u8>) -> Result<(), RingError> {
        self.rings[NUM_RINGS - 1].get_speech_data(out)
    }

    pub fn tail_ring(&self) -> &CharBuffer {
        &self.rings[NUM_RINGS - 1]
    }

    /// Runs `reset(mode)` per §4.6: terminate then initialize every stage
    /// in order, then reset every intermediate ring.
    pub fn reset(&mut self, mode: ResetMode, voice: &Voice, arena: &Arena) {
        for stage in self.stages.iter_mut() {
            stage.terminate();
            stage.initialize(mode, voice, arena);
        }
        for ring in self.rings.iter_mut() {
            ring.reset();
        }
        self.cur_pu = 0;
        self.last_status = [StepResult::Idle; NUM_STAGES];
    }

    fn has_downstream(cur: usize) -> bool {
        cur + 1 < NUM_STAGES
    }

    /// Runs one scheduler tick per §4.6's per-tick algorithm.
    pub fn tick(&mut self, voice: &Voice, arena: &Arena, diag: &mut Diagnostics) -> StepResult {
        let cur = self.cur_pu;
        let before_out_len = self.rings[cur + 1].len();

        let (cb_in, cb_out) = split_adjacent(&mut self.rings, cur);
        let r = self.stages[cur].step(cb_in, cb_out, voice, arena, diag);
        self.last_status[cur] = r;

        match r {
            StepResult::Atomic => r,
            StepResult::Busy => {
                let produced = self.rings[cur + 1].len() > before_out_len;
                if produced && Self::has_downstream(cur) {
                    self.last_status[cur + 1] = StepResult::Busy;
                    self.cur_pu = cur + 1;
                }
                r
            }
            StepResult::Idle => {
                if Self::has_downstream(cur) && self.last_status[cur + 1] == StepResult::Busy {
                    self.cur_pu = cur + 1;
                    return r;
                }
                for i in (0..cur).rev() {
                    if self.last_status[i] != StepResult::Idle {
                        self.cur_pu = i;
                        self.last_status[i] = StepResult::Busy;
                        return r;
                    }
                }
                r
            }
            StepResult::OutFull => {
                if Self::has_downstream(cur) {
                    self.cur_pu = cur + 1;
                    self.last_status[cur + 1] = StepResult::Busy;
                }
                r
            }
            StepResult::Error => r,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits the ring array into the `(cb_in, cb_out)` pair for stage `cur`
/// (rings `cur` and `cur + 1`), which are always adjacent and distinct.
fn split_adjacent(rings: &mut [CharBuffer; NUM_RINGS], cur: usize) -> (&mut CharBuffer, &mut CharBuffer) {
    let (left, right) = rings.split_at_mut(cur + 1);
    (&mut left[cur], &mut right[0])
}
