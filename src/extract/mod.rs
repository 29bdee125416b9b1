//! Candidate extraction from the two publication sources.

use std::collections::HashSet;

use crate::record::Record;

pub mod ads;
pub mod cv;

/// What an extractor produced for one run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// Candidates dropped because a mandatory field could not be recovered.
    pub dropped: usize,
}

/// Hands out unique keys within one run: the first use of a base key gets it as is, later
/// uses get `a`, `b`, `c`, ... appended in order of discovery.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    used: HashSet<String>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let mut key = base.to_string();
        let mut n: u32 = 0;
        while self.used.contains(&key) {
            n += 1;
            key = format!("{base}{}", suffix(n));
        }
        self.used.insert(key.clone());
        key
    }
}

// 1 -> a, 26 -> z, 27 -> aa, ...
fn suffix(mut n: u32) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    out.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collisions_get_letter_suffixes_in_order() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.allocate("hayne2017"), "hayne2017");
        assert_eq!(keys.allocate("hayne2017"), "hayne2017a");
        assert_eq!(keys.allocate("paige2010"), "paige2010");
        assert_eq!(keys.allocate("hayne2017"), "hayne2017b");
    }

    #[test]
    fn suffixes_roll_over_past_z() {
        assert_eq!(suffix(1), "a");
        assert_eq!(suffix(26), "z");
        assert_eq!(suffix(27), "aa");
    }

    #[test]
    fn allocated_keys_are_unique() {
        proptest::proptest!(|(bases in proptest::collection::vec("[a-c]{1,2}", 0..60))| {
            let mut keys = KeyAllocator::new();
            let out: Vec<String> = bases.iter().map(|b| keys.allocate(b)).collect();
            let unique: HashSet<&String> = out.iter().collect();
            proptest::prop_assert_eq!(unique.len(), out.len());
            for (b, k) in bases.iter().zip(&out) {
                proptest::prop_assert!(k.starts_with(b.as_str()));
            }
        })
    }
}
