//! Tokenizer stage (§4.7): UTF-8 bytes in, `Token`/`Punc`/`Cmd` items out.
//!
//! The character-class graph table and the markup command tables are
//! knowledge-base content (linguistic rules out of scope per the
//! purpose/scope Non-goals); this stage ships a built-in ASCII classifier
//! and a fixed command-name table as the stand-in a real voice's graph
//! table would otherwise drive, while fully honoring the stage's
//! step/item contract.

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::{Code, Diagnostics};
use crate::item::{CmdKind, CmdPhase, Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Letter,
    Digit,
    Sequence,
    Space,
    Char,
    Undefined,
}

fn classify(c: char) -> CharClass {
    if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_whitespace() {
        CharClass::Space
    } else if c.is_ascii_punctuation() {
        CharClass::Char
    } else if c == '\u{0}' {
        CharClass::Char
    } else {
        CharClass::Undefined
    }
}

fn cmd_kind_from_name(name: &str) -> Option<CmdKind> {
    use CmdKind::*;
    Some(match name {
        "volume" => Volume,
        "pitch" => Pitch,
        "speed" => Speed,
        "speaker" => Speaker,
        "voice" => Voice,
        "preprocontext" => Preprocontext,
        "mark" => Mark,
        "play" => Play,
        "usesig" => Usesig,
        "genfile" => Genfile,
        "sentence" => Sentence,
        "paragraph" => Paragraph,
        "break" => Break,
        "spell" => Spell,
        "phoneme" => Phoneme,
        "item" => Item,
        "ignore" => Ignore,
        _ => return None,
    })
}

fn needs_level_attr(kind: CmdKind) -> bool {
    matches!(kind, CmdKind::Speed | CmdKind::Pitch | CmdKind::Volume)
}

/// Validates a `level` value against the published ranges: 20-500 is
/// absolute, 500-2000 is per-mille of the current setting.
fn validate_level(v: i64) -> Option<u16> {
    if (20..=2000).contains(&v) {
        Some(v as u16)
    } else {
        None
    }
}

enum Mode {
    Text,
    Markup { raw: Vec<u8>, in_quote: Option<u8>, escape_next: bool },
}

pub struct Tokenizer {
    mode: Mode,
    token_buf: Vec<u8>,
    token_class: Option<CharClass>,
    utf8_buf: Vec<u8>,
    eol_run: u32,
    pending_emit: VecDeque<Item>,
    replay: VecDeque<u8>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            mode: Mode::Text,
            token_buf: Vec::new(),
            token_class: None,
            utf8_buf: Vec::new(),
            eol_run: 0,
            pending_emit: VecDeque::new(),
            replay: VecDeque::new(),
        }
    }

    fn flush_token(&mut self) {
        if let Some(class) = self.token_class.take() {
            if !self.token_buf.is_empty() {
                if let Some(item) = Item::new(ItemType::Token, class as u8, 0, std::mem::take(&mut self.token_buf)) {
                    self.pending_emit.push_back(item);
                }
            }
            self.token_buf.clear();
        }
    }

    fn emit_punc(&mut self, byte: u8) {
        if let Some(item) = Item::new(ItemType::Punc, 0, 0, vec![byte]) {
            self.pending_emit.push_back(item);
        }
    }

    fn emit_cmd(&mut self, kind: CmdKind, phase: CmdPhase, value: Option<u16>) {
        let payload = match value {
            Some(v) => v.to_le_bytes().to_vec(),
            None => Vec::new(),
        };
        if let Some(item) = Item::new(ItemType::Cmd, kind as u8, phase as u8, payload) {
            self.pending_emit.push_back(item);
        }
    }

    /// Parses a completed `< ... >` tag (byte slice excluding the angle
    /// brackets). Returns `Some(())` if it dispatched cleanly.
    fn dispatch_tag(&mut self, inner: &[u8], _diag: &mut Diagnostics) -> bool {
        let text = match std::str::from_utf8(inner) {
            Ok(t) => t,
            Err(_) => return false,
        };
        let text = text.trim();
        let closing = text.starts_with('/');
        let text = text.trim_start_matches('/');
        let text = text.trim_end_matches('/');

        let name_end = text
            .find(|c: char| c.is_whitespace())
            .unwrap_or(text.len());
        let name = text[..name_end].to_ascii_lowercase();
        let rest = &text[name_end..];

        let kind = match cmd_kind_from_name(&name) {
            Some(k) => k,
            None => return false,
        };

        let phase = if closing { CmdPhase::End } else { CmdPhase::Start };

        if needs_level_attr(kind) && !closing {
            let level = parse_attr(rest, "level").and_then(|v| v.parse::<i64>().ok());
            match level.and_then(validate_level) {
                Some(v) => self.emit_cmd(kind, phase, Some(v)),
                None => return false,
            }
        } else {
            self.emit_cmd(kind, phase, None);
        }
        true
    }

    fn process_char(&mut self, c: char, diag: &mut Diagnostics) {
        if matches!(self.mode, Mode::Text) && c == '<' {
            self.flush_token();
            self.mode = Mode::Markup {
                raw: Vec::new(),
                in_quote: None,
                escape_next: false,
            };
            return;
        }

        if let Mode::Markup { .. } = self.mode {
            self.feed_markup_char(c, diag);
            return;
        }

        if c == '\u{0}' {
            self.flush_token();
            self.emit_cmd(CmdKind::Flush, CmdPhase::Start, None);
            self.eol_run = 0;
            return;
        }

        if c == '\n' {
            self.eol_run += 1;
            if self.eol_run >= 2 {
                self.flush_token();
                self.emit_punc(b'.');
                self.eol_run = 0;
                return;
            }
        } else if !c.is_whitespace() {
            self.eol_run = 0;
        }

        let class = classify(c);
        if class == CharClass::Char && (c == '.' || c == '!' || c == '?') {
            self.flush_token();
            self.emit_punc(c as u8);
            return;
        }

        if self.token_class.is_some() && self.token_class != Some(class) {
            self.flush_token();
        }
        self.token_class = Some(class);
        let mut buf = [0u8; 4];
        let bytes = c.encode_utf8(&mut buf).as_bytes();
        if self.token_buf.len() + bytes.len() > 255 {
            self.flush_token();
            self.token_class = Some(class);
        }
        self.token_buf.extend_from_slice(bytes);
    }

    fn feed_markup_char(&mut self, c: char, diag: &mut Diagnostics) {
        let Mode::Markup { raw, in_quote, escape_next } = &mut self.mode else {
            unreachable!()
        };
        let byte = if c.is_ascii() { c as u8 } else { b'?' };

        if *escape_next {
            raw.push(byte);
            *escape_next = false;
            return;
        }
        match in_quote {
            Some(q) if byte == b'\\' => {
                *escape_next = true;
                raw.push(byte);
                let _ = q;
            }
            Some(q) if byte == *q => {
                raw.push(byte);
                *in_quote = None;
            }
            Some(_) => raw.push(byte),
            None => match byte {
                b'"' | b'\'' => {
                    *in_quote = Some(byte);
                    raw.push(byte);
                }
                b'>' => {
                    let raw = std::mem::take(raw);
                    self.mode = Mode::Text;
                    if !self.dispatch_tag(&raw, diag) {
                        diag.raise_warning(Code::InvalidMarkupTag, "malformed markup tag");
                        self.replay.push_back(b'<');
                        for b in raw {
                            self.replay.push_back(b);
                        }
                        self.replay.push_back(b'>');
                    }
                }
                _ if raw.len() >= 254 => {
                    diag.raise_warning(Code::InvalidMarkupTag, "markup tag too long");
                    let raw = std::mem::take(raw);
                    self.mode = Mode::Text;
                    self.replay.push_back(b'<');
                    for b in raw {
                        self.replay.push_back(b);
                    }
                }
                _ => raw.push(byte),
            },
        }
    }
}

fn parse_attr<'a>(rest: &'a str, key: &str) -> Option<&'a str> {
    let idx = rest.find(key)?;
    let after = &rest[idx + key.len()..];
    let eq = after.find('=')?;
    let after_eq = after[eq + 1..].trim_start();
    let quote = after_eq.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value_start = &after_eq[1..];
    let end = value_start.find(quote)?;
    Some(&value_start[..end])
}

impl ProcessingUnit for Tokenizer {
    fn initialize(&mut self, mode: ResetMode, _voice: &Voice, _arena: &Arena) {
        self.mode = Mode::Text;
        self.token_buf.clear();
        self.token_class = None;
        self.utf8_buf.clear();
        self.eol_run = 0;
        self.pending_emit.clear();
        self.replay.clear();
        let _ = mode;
    }

    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        _voice: &Voice,
        _arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult {
        if let Some(item) = self.pending_emit.front() {
            match cb_out.put_item(item) {
                Ok(()) => {
                    self.pending_emit.pop_front();
                    if self.pending_emit.is_empty() {
                        StepResult::Busy
                    } else {
                        StepResult::Atomic
                    }
                }
                Err(RingError::BufOverflow) => StepResult::OutFull,
                Err(_) => StepResult::Error,
            }
        } else if let Some(b) = self.replay.pop_front() {
            self.process_char(b as char, diag);
            StepResult::Busy
        } else {
            match cb_in.get_ch() {
                Ok(b) => {
                    self.utf8_buf.push(b);
                    match std::str::from_utf8(&self.utf8_buf) {
                        Ok(s) => {
                            let c = s.chars().next().unwrap();
                            self.utf8_buf.clear();
                            self.process_char(c, diag);
                            StepResult::Busy
                        }
                        Err(e) if e.error_len().is_none() && self.utf8_buf.len() < 4 => {
                            StepResult::Busy
                        }
                        Err(_) => {
                            diag.raise_warning(Code::IrregularItem, "malformed utf-8 sequence");
                            self.utf8_buf.clear();
                            StepResult::Busy
                        }
                    }
                }
                Err(RingError::Eof) => StepResult::Idle,
                Err(_) => StepResult::Error,
            }
        }
    }

    fn terminate(&mut self) {
        self.mode = Mode::Text;
        self.pending_emit.clear();
    }
}
