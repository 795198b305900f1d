//! String hashing for ring positions.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a key onto the `0..=u32::MAX` ring space.
///
/// FNV-1a over the UTF-8 bytes followed by the murmur3 finalizer. The
/// finalizer spreads keys that differ only in their last byte (such as
/// `"10.0.0.1:4000:7"` and `"10.0.0.1:4000:8"`) across the whole space.
pub fn hash_key(key: &str) -> u32 {
    let mut h = FNV_OFFSET;
    for byte in key.as_bytes() {
        h ^= u32::from(*byte);
        h = h.wrapping_mul(FNV_PRIME);
    }
    fmix32(h)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
