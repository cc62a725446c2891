//! RC4 key stream.
//!
//! The cipher state is plain data so a key context can be cloned mid-stream.

use zeroize::Zeroize;

#[derive(Clone)]
pub struct Rc4State {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4State {
    /// Run the key schedule over `key` (1..=256 bytes).
    pub fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        if !key.is_empty() {
            let mut j: u8 = 0;
            for idx in 0..256 {
                j = j.wrapping_add(s[idx]).wrapping_add(key[idx % key.len()]);
                s.swap(idx, j as usize);
            }
        }
        Self { s, i: 0, j: 0 }
    }

    /// XOR the key stream into `data`.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.s[self.i as usize].wrapping_add(self.s[self.j as usize]) as usize];
            *byte ^= k;
        }
    }
}

impl std::fmt::Debug for Rc4State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rc4State(..)")
    }
}

impl Drop for Rc4State {
    fn drop(&mut self) {
        self.s.zeroize();
    }
}
