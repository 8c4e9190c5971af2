//! `SharedValueStore` (§6): the `tvar<double>` / `tcache<K,double>`
//! shared-memory override segments. Readers tolerate torn reads by
//! treating values as hints, not truths (§5) — the `memmap2`-backed
//! implementation guards each slot with a sequence number, the same
//! seqlock idiom the reference deployment's core `Position` type uses for
//! lock-free reads.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use tracing::warn;

/// Read/write access to the two keyed shared-memory segments. `tvar` is
/// read-only from the engine's perspective (an external process writes
/// it); `tcache` is engine-written, `"<id>_leg1_pos"`/`"<id>_leg2_pos"`
/// style keys updated on every fill.
pub trait SharedValueStore: Send + Sync {
    /// Current `tValue` for `key`, or `0.0` if unset — absence is not an
    /// error, the caller treats it as "no override" (§6).
    fn get_tvalue(&self, key: &str) -> f64;

    fn set_tcache(&self, key: &str, value: f64);

    fn get_tcache(&self, key: &str) -> Option<f64>;
}

/// In-memory test double: two plain maps behind an `RwLock`, no torn-read
/// simulation needed since there's no real concurrent writer to race.
#[derive(Default)]
pub struct TestSharedValueStore {
    tvar: RwLock<HashMap<String, f64>>,
    tcache: RwLock<HashMap<String, f64>>,
}

impl TestSharedValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: seed a `tValue` as if an external process had written it.
    pub fn set_tvalue(&self, key: &str, value: f64) {
        self.tvar.write().insert(key.to_string(), value);
    }
}

impl SharedValueStore for TestSharedValueStore {
    fn get_tvalue(&self, key: &str) -> f64 {
        self.tvar.read().get(key).copied().unwrap_or(0.0)
    }

    fn set_tcache(&self, key: &str, value: f64) {
        self.tcache.write().insert(key.to_string(), value);
    }

    fn get_tcache(&self, key: &str) -> Option<f64> {
        self.tcache.read().get(key).copied()
    }
}

/// Fixed-layout memory-mapped region standing in for the real shared-memory
/// transport. Each slot is 32 bytes: `[key_hash: u64][seq: u64][value: f64][reserved: u64]`.
/// Writers bump `seq` to odd before writing `value` and back to even after,
/// so a reader that observes an odd or changing `seq` across its read
/// retries a bounded number of times, then falls back to its last
/// observation — a hint, never a panic (§5).
pub struct MmapSharedValueStore {
    tvar: RwLock<memmap2::MmapMut>,
    tcache: RwLock<memmap2::MmapMut>,
    capacity: usize,
}

const SLOT_BYTES: usize = 32;
const READ_RETRIES: u32 = 8;

impl MmapSharedValueStore {
    /// Opens (creating if absent) two fixed-size backing files, each sized
    /// for `capacity` key slots.
    pub fn open(tvar_path: impl AsRef<Path>, tcache_path: impl AsRef<Path>, capacity: usize) -> io::Result<Self> {
        Ok(Self {
            tvar: RwLock::new(open_mmap(tvar_path, capacity)?),
            tcache: RwLock::new(open_mmap(tcache_path, capacity)?),
            capacity,
        })
    }

    fn slot_index(&self, key: &str) -> usize {
        fnv1a(key) as usize % self.capacity.max(1)
    }

    fn read_slot(map: &memmap2::MmapMut, index: usize, key_hash: u64) -> Option<f64> {
        let base = index * SLOT_BYTES;
        let mut last_value = None;
        for _ in 0..READ_RETRIES {
            let bytes = &map[base..base + SLOT_BYTES];
            let slot_hash = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
            let seq_before = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
            let value = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
            let seq_after = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
            if slot_hash != key_hash {
                return None;
            }
            if seq_before == seq_after && seq_before % 2 == 0 {
                return Some(value);
            }
            last_value = Some(value);
        }
        warn!("shared-value store: slot did not stabilize after {READ_RETRIES} retries, returning last observed hint");
        last_value
    }

    fn write_slot(map: &mut memmap2::MmapMut, index: usize, key_hash: u64, value: f64) {
        let base = index * SLOT_BYTES;
        let seq = u64::from_le_bytes(map[base + 8..base + 16].try_into().unwrap());
        let next_odd = seq | 1;
        map[base..base + 8].copy_from_slice(&key_hash.to_le_bytes());
        map[base + 8..base + 16].copy_from_slice(&next_odd.to_le_bytes());
        map[base + 16..base + 24].copy_from_slice(&value.to_le_bytes());
        map[base + 8..base + 16].copy_from_slice(&(next_odd + 1).to_le_bytes());
    }
}

impl SharedValueStore for MmapSharedValueStore {
    fn get_tvalue(&self, key: &str) -> f64 {
        let index = self.slot_index(key);
        let hash = fnv1a(key);
        Self::read_slot(&self.tvar.read(), index, hash).unwrap_or(0.0)
    }

    fn set_tcache(&self, key: &str, value: f64) {
        let index = self.slot_index(key);
        let hash = fnv1a(key);
        Self::write_slot(&mut self.tcache.write(), index, hash, value);
    }

    fn get_tcache(&self, key: &str) -> Option<f64> {
        let index = self.slot_index(key);
        let hash = fnv1a(key);
        Self::read_slot(&self.tcache.read(), index, hash)
    }
}

fn open_mmap(path: impl AsRef<Path>, capacity: usize) -> io::Result<memmap2::MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    let len = (capacity.max(1) * SLOT_BYTES) as u64;
    file.set_len(len)?;
    unsafe { memmap2::MmapMut::map_mut(&file) }
}

fn fnv1a(key: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    key.bytes().fold(OFFSET, |hash, b| (hash ^ b as u64).wrapping_mul(PRIME))
}
