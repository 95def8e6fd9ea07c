//! Encoding dictionary (C2) — bidirectional string<->i32 codec.
//!
//! Two independent dictionaries exist per fitted model: one for categorical
//! column values, one for join-key values (spec §3/§4.1). Both share this
//! same implementation. Codes are dense in `[0, n)`, append-only, and once
//! assigned are stable for the lifetime of the process/model: a saved model
//! replays the exact encoding it was fit with, and unseen strings at
//! transform time decode to null (code `-1`) rather than growing the table.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Null sentinel for encoded category/join-key columns.
pub const NULL_CODE: i32 = -1;

#[derive(Default)]
struct EncInner {
    strings: Vec<String>,
    codes: HashMap<String, i32>,
}

/// Append-only bidirectional string<->i32 dictionary.
///
/// Cloning an `Enc` is cheap and shares the underlying table (`Arc`-free:
/// callers that need sharing wrap it in `Arc<Enc>` themselves, matching how
/// `Df` shares columns immutably).
#[derive(Default)]
pub struct Enc {
    inner: RwLock<EncInner>,
    /// Once `true`, `intern` never allocates a new code: this is the state
    /// a saved model is loaded into, so replaying it at transform is
    /// guaranteed to reproduce the same mapping.
    frozen: RwLock<bool>,
}

impl Enc {
    pub fn new() -> Self {
        Enc::default()
    }

    /// Interns `s`, returning its code. Idempotent: the same string always
    /// yields the same code. O(1) amortized.
    ///
    /// If the dictionary is frozen (post-fit, at transform) and `s` was
    /// never seen during fit, returns [`NULL_CODE`] instead of growing the
    /// table.
    pub fn intern(&self, s: &str) -> i32 {
        if let Some(&code) = self.inner.read().codes.get(s) {
            return code;
        }
        if *self.frozen.read() {
            return NULL_CODE;
        }
        let mut inner = self.inner.write();
        if let Some(&code) = inner.codes.get(s) {
            return code;
        }
        let code = inner.strings.len() as i32;
        inner.strings.push(s.to_string());
        inner.codes.insert(s.to_string(), code);
        code
    }

    /// Decodes `code` back to its string. `None` for `NULL_CODE` or any
    /// code never assigned.
    pub fn decode(&self, code: i32) -> Option<String> {
        if code < 0 {
            return None;
        }
        let inner = self.inner.read();
        inner.strings.get(code as usize).cloned()
    }

    /// Number of distinct codes currently assigned.
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freezes the dictionary: subsequent `intern` calls on unseen strings
    /// return `NULL_CODE` instead of allocating. Called once a model has
    /// finished fitting, before it is used for transform.
    pub fn freeze(&self) {
        *self.frozen.write() = true;
    }

    pub fn is_frozen(&self) -> bool {
        *self.frozen.read()
    }

    /// Merges `other` into `self`, remapping `other`'s codes into `self`'s
    /// code space. Returns the remap table (`other_code -> self_code`),
    /// indexed by `other_code`.
    pub fn append(&self, other: &Enc) -> Vec<i32> {
        let other_strings = other.inner.read().strings.clone();
        other_strings.iter().map(|s| self.intern(s)).collect()
    }

    /// Snapshot of all (code, string) pairs in code order, for persistence.
    pub fn entries(&self) -> Vec<String> {
        self.inner.read().strings.clone()
    }

    /// Rebuilds an `Enc` from an ordered list of strings (code = index),
    /// frozen immediately — this is how a saved model's encoding is
    /// reloaded at transform time.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut codes = HashMap::with_capacity(entries.len());
        for (i, s) in entries.iter().enumerate() {
            codes.insert(s.clone(), i as i32);
        }
        Enc {
            inner: RwLock::new(EncInner { strings: entries, codes }),
            frozen: RwLock::new(true),
        }
    }

    /// Writes the length-prefixed UTF-8 string file format described in
    /// the persisted-model layout: a little-endian `u64` count, then for
    /// each string a little-endian `u32` byte length followed by its UTF-8
    /// bytes, sequentially. Little-endian regardless of host (see
    /// DESIGN.md Open Question on string-file endianness).
    pub fn write_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        let entries = self.entries();
        w.write_all(&(entries.len() as u64).to_le_bytes())?;
        for s in &entries {
            let bytes = s.as_bytes();
            w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            w.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> std::io::Result<Self> {
        let mut count_buf = [0u8; 8];
        r.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf) as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            r.read_exact(&mut buf)?;
            entries.push(String::from_utf8(buf).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, e)
            })?);
        }
        Ok(Enc::from_entries(entries))
    }
}

/// Serializable snapshot used for JSON manifests (as opposed to the binary
/// string-file format used for the large fitted-encoding blob).
#[derive(Serialize, Deserialize)]
pub struct EncSnapshot {
    pub strings: Vec<String>,
}

impl From<&Enc> for EncSnapshot {
    fn from(e: &Enc) -> Self {
        EncSnapshot { strings: e.entries() }
    }
}

impl From<EncSnapshot> for Enc {
    fn from(s: EncSnapshot) -> Self {
        Enc::from_entries(s.strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent_and_decode_round_trips() {
        let enc = Enc::new();
        let a = enc.intern("alice");
        let b = enc.intern("bob");
        let a2 = enc.intern("alice");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(enc.decode(a).as_deref(), Some("alice"));
        assert_eq!(enc.decode(b).as_deref(), Some("bob"));
    }

    #[test]
    fn codes_are_dense() {
        let enc = Enc::new();
        let strings = ["a", "b", "c", "d"];
        let codes: Vec<i32> = strings.iter().map(|s| enc.intern(s)).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn frozen_encoding_sends_unseen_strings_to_null() {
        let enc = Enc::new();
        enc.intern("known");
        enc.freeze();
        assert_eq!(enc.intern("unknown"), NULL_CODE);
        assert_eq!(enc.decode(NULL_CODE), None);
    }

    #[test]
    fn string_file_round_trips() {
        let enc = Enc::new();
        enc.intern("hello");
        enc.intern("world");
        let mut buf = Vec::new();
        enc.write_to(&mut buf).unwrap();
        let loaded = Enc::read_from(&buf[..]).unwrap();
        assert_eq!(loaded.decode(0).as_deref(), Some("hello"));
        assert_eq!(loaded.decode(1).as_deref(), Some("world"));
        assert!(loaded.is_frozen());
    }

    #[test]
    fn append_remaps_codes() {
        let a = Enc::new();
        a.intern("x");
        a.intern("y");
        let b = Enc::new();
        b.intern("y");
        b.intern("z");
        let remap = a.append(&b);
        // b's "y" (code 0) must map to a's existing "y" code.
        assert_eq!(a.decode(remap[0]).as_deref(), Some("y"));
        assert_eq!(a.decode(remap[1]).as_deref(), Some("z"));
    }
}
