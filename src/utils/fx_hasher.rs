//! FxHasher taken from rustc_hash, except that it does not depend on the pointer size.

const K: u32 = 0x9e3779b9;

/// This is the same as FxHasher, but with the guarantee that the internal hash is
/// an u32 instead of something that depends on the platform.
///
/// Its state is fixed at construction, so maps built with it iterate in the same order
/// from one run to the next given the same sequence of insertions.
#[derive(Default, Copy, Clone)]
pub struct FxHasher32 {
    hash: u32,
}

impl FxHasher32 {
    #[inline]
    fn add_to_hash(&mut self, i: u32) {
        self.hash = (self.hash.rotate_left(5) ^ i).wrapping_mul(K);
    }
}

impl core::hash::Hasher for FxHasher32 {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(4);

        for chunk in &mut chunks {
            self.add_to_hash(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        let rest = chunks.remainder();
        if rest.len() >= 2 {
            self.add_to_hash(u16::from_ne_bytes([rest[0], rest[1]]) as u32);
        }
        if rest.len() % 2 == 1 {
            self.add_to_hash(rest[rest.len() - 1] as u32);
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.add_to_hash(i as u32);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.add_to_hash(i as u32);
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.add_to_hash(i);
    }

    #[inline]
    fn write_i32(&mut self, i: i32) {
        self.add_to_hash(i as u32);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.add_to_hash(i as u32);
        self.add_to_hash((i >> 32) as u32);
    }

    #[inline]
    fn write_i64(&mut self, i: i64) {
        self.write_u64(i as u64);
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.hash as u64
    }
}
