//! Fixed-capacity byte ring with item-aware operations.
//!
//! Raw operations (`put_ch`/`get_ch`) work a byte at a time, used at the
//! pipeline's external head and tail. Item operations (`put_item`/
//! `get_item`) move a whole header+payload atomically: a failed `put_item`
//! leaves the ring exactly as it was (§8 property 3).

use crate::item::{Item, HEADER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    Eof,
    BufOverflow,
    BufUnderflow,
}

pub struct CharBuffer {
    buf: Vec<u8>,
    cap: usize,
    head: usize,
    len: usize,
}

impl CharBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)],
            cap: capacity.max(1),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.cap
    }

    fn peek(&self, offset: usize) -> u8 {
        self.buf[(self.head + offset) % self.cap]
    }

    fn tail_index(&self) -> usize {
        (self.head + self.len) % self.cap
    }

    pub fn put_ch(&mut self, b: u8) -> Result<(), RingError> {
        if self.is_full() {
            return Err(RingError::BufOverflow);
        }
        let idx = self.tail_index();
        self.buf[idx] = b;
        self.len += 1;
        Ok(())
    }

    pub fn get_ch(&mut self) -> Result<u8, RingError> {
        if self.is_empty() {
            return Err(RingError::Eof);
        }
        let b = self.peek(0);
        self.head = (self.head + 1) % self.cap;
        self.len -= 1;
        Ok(b)
    }

    /// Moves a whole item in atomically, or fails with `BufOverflow`
    /// leaving the ring unchanged.
    pub fn put_item(&mut self, item: &Item) -> Result<(), RingError> {
        let needed = item.wire_len();
        if needed > self.cap - self.len {
            return Err(RingError::BufOverflow);
        }
        let mut wire = Vec::with_capacity(needed);
        item.encode(&mut wire);
        for b in wire {
            let idx = self.tail_index();
            self.buf[idx] = b;
            self.len += 1;
        }
        Ok(())
    }

    /// Reads the header at the front of the ring without consuming
    /// anything, reporting the declared payload length if a full header
    /// is present.
    fn peek_header_len(&self) -> Option<usize> {
        if self.len < HEADER_LEN {
            return None;
        }
        Some(self.peek(3) as usize)
    }

    /// Moves a whole item out atomically. `BufUnderflow` (ring unchanged)
    /// if a complete item is not yet present.
    pub fn get_item(&mut self) -> Result<Item, RingError> {
        let payload_len = match self.peek_header_len() {
            Some(l) => l,
            None => return Err(RingError::BufUnderflow),
        };
        let total = HEADER_LEN + payload_len;
        if self.len < total {
            return Err(RingError::BufUnderflow);
        }
        let mut wire = Vec::with_capacity(total);
        for i in 0..total {
            wire.push(self.peek(i));
        }
        self.head = (self.head + total) % self.cap;
        self.len -= total;
        let (item, consumed) = Item::decode(&wire).expect("length already validated");
        debug_assert_eq!(consumed, total);
        Ok(item)
    }

    /// Like `get_item`, but only ever yields a `Frame` item's payload;
    /// items of any other type are silently dropped. Returns `Eof` once
    /// the ring is drained without producing a frame.
    pub fn get_speech_data(&mut self, out: &mut Vec<u8>) -> Result<(), RingError> {
        loop {
            let item = self.get_item()?;
            if item.kind() == Some(crate::item::ItemType::Frame) {
                out.clear();
                out.extend_from_slice(&item.payload);
                return Ok(());
            }
        }
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
