//! On-disk hash index over a string table.
//!
//! Layout (two files, all integers little-endian):
//! - hash file: `{ hashbits: u32 }`, then `1 << hashbits` u32 offsets into
//!   the data file, 0 meaning an empty bucket;
//! - data file: one reserved zero byte, then bucket records
//!   `{ size: u32, ids: u32[size] }` with ids sorted ascending.
//!
//! Keys are hashed with xxHash32, seed 0, and the low `hashbits` bits select
//! the bucket. A bucket holds at most [`HASH_BUCKET_CAPACITY`] ids; the
//! builder fails with `TooManyCollisions` when one would overflow, and the
//! remedy is rebuilding with a larger `hashbits`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glacier_error::{GlacierError, Result};
use glacier_types::{HASH_BUCKET_CAPACITY, hash_bits, hash_mask, hash_size};
use smallvec::SmallVec;
use xxhash_rust::xxh32::xxh32;

use crate::filemap::{FileView, Record};

/// xxHash32 of `key` with the format's fixed seed.
#[must_use]
pub fn key_hash(key: &[u8]) -> u32 {
    xxh32(key, 0)
}

/// Read side of the index.
#[derive(Debug)]
pub struct HashIndex {
    hash: FileView,
    data: FileView,
    hashbits: u32,
}

impl HashIndex {
    /// Open and validate both files.
    pub fn open(hash_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Result<Self> {
        let hash = FileView::open(hash_path)?;
        let data = FileView::open(data_path)?;

        if hash.len() < 4 {
            return Err(GlacierError::corrupt(hash.path(), "missing hashbits header"));
        }
        let hashbits = u32::read(hash.bytes());
        let expect = 4 + hash_size(hashbits) as usize * 4;
        if hash.len() != expect {
            return Err(GlacierError::corrupt(
                hash.path(),
                format!("table size {} does not match hashbits {hashbits}", hash.len()),
            ));
        }
        for slot in 0..hash_size(hashbits) as usize {
            let off = u32::read(&hash.bytes()[4 + slot * 4..]) as usize;
            if off == 0 {
                continue;
            }
            let size = data
                .bytes()
                .get(off..off + 4)
                .map(|b| u32::read(b) as usize)
                .ok_or_else(|| {
                    GlacierError::corrupt(data.path(), format!("bucket offset {off} out of range"))
                })?;
            if size > HASH_BUCKET_CAPACITY || data.len() < off + 4 + size * 4 {
                return Err(GlacierError::corrupt(
                    data.path(),
                    format!("bucket at {off} has invalid size {size}"),
                ));
            }
        }
        Ok(Self { hash, data, hashbits })
    }

    /// Table size exponent.
    #[must_use]
    pub fn hashbits(&self) -> u32 {
        self.hashbits
    }

    /// Ids stored in the bucket `key` hashes into. Empty on empty buckets.
    fn bucket(&self, hashed: u32) -> impl Iterator<Item = u32> + '_ {
        let slot = (hashed & hash_mask(self.hashbits)) as usize;
        let off = u32::read(&self.hash.bytes()[4 + slot * 4..]) as usize;
        let (start, size) = if off == 0 {
            (0, 0)
        } else {
            (off + 4, u32::read(&self.data.bytes()[off..]) as usize)
        };
        (0..size).map(move |i| u32::read(&self.data.bytes()[start + i * 4..]))
    }

    /// Find the id whose key equals `key`, resolving candidate ids to their
    /// stored key bytes through `resolve`.
    ///
    /// A miss is not an error.
    pub fn search_with<'a, F>(&self, key: &[u8], resolve: F) -> Option<u32>
    where
        F: Fn(u32) -> Option<&'a [u8]>,
    {
        self.search_hashed_with(key, key_hash(key), resolve)
    }

    /// [`Self::search_with`] with a precomputed xxHash32 value.
    pub fn search_hashed_with<'a, F>(&self, key: &[u8], hashed: u32, resolve: F) -> Option<u32>
    where
        F: Fn(u32) -> Option<&'a [u8]>,
    {
        self.bucket(hashed)
            .find(|&id| resolve(id).is_some_and(|stored| stored == key))
    }
}

/// Build side of the index.
#[derive(Debug)]
pub struct HashIndexBuilder {
    buckets: Vec<SmallVec<[u32; HASH_BUCKET_CAPACITY]>>,
    hashbits: u32,
}

impl HashIndexBuilder {
    /// Size the table for `keys` keys (`hashbits = ceil(log2(keys)) + 1`).
    #[must_use]
    pub fn new(keys: u64) -> Self {
        Self::with_hash_bits(hash_bits(keys))
    }

    /// Size the table explicitly — the rebuild remedy for collision failures.
    #[must_use]
    pub fn with_hash_bits(hashbits: u32) -> Self {
        Self {
            buckets: vec![SmallVec::new(); hash_size(hashbits) as usize],
            hashbits,
        }
    }

    /// Insert key `id` with key bytes `key`.
    pub fn insert(&mut self, id: u32, key: &[u8]) -> Result<()> {
        self.insert_hashed(id, key_hash(key))
    }

    /// Insert with a precomputed hash.
    pub fn insert_hashed(&mut self, id: u32, hashed: u32) -> Result<()> {
        let slot = (hashed & hash_mask(self.hashbits)) as usize;
        let bucket = &mut self.buckets[slot];
        if bucket.len() == HASH_BUCKET_CAPACITY {
            return Err(GlacierError::TooManyCollisions {
                hashbits: self.hashbits,
            });
        }
        bucket.push(id);
        Ok(())
    }

    /// Write both files.
    pub fn write(mut self, hash_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Result<()> {
        let mut hash = BufWriter::new(File::create(hash_path)?);
        let mut data = BufWriter::new(File::create(data_path)?);

        hash.write_all(&self.hashbits.to_le_bytes())?;
        data.write_all(&[0u8])?;

        let mut offset = 1u32;
        for bucket in &mut self.buckets {
            if bucket.is_empty() {
                hash.write_all(&0u32.to_le_bytes())?;
                continue;
            }
            bucket.sort_unstable();
            hash.write_all(&offset.to_le_bytes())?;
            data.write_all(&(bucket.len() as u32).to_le_bytes())?;
            for &id in bucket.iter() {
                data.write_all(&id.to_le_bytes())?;
            }
            offset = offset
                .checked_add(4 + 4 * bucket.len() as u32)
                .ok_or_else(|| GlacierError::internal("hash data file exceeds u32 offsets"))?;
        }
        hash.flush()?;
        data.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn build_index(keys: &[&[u8]]) -> (tempfile::TempDir, HashIndex) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut builder = HashIndexBuilder::new(keys.len() as u64);
        for (i, key) in keys.iter().enumerate() {
            builder.insert(i as u32, key).expect("insert");
        }
        builder
            .write(dir.path().join("hash"), dir.path().join("hashdata"))
            .expect("write");
        let index =
            HashIndex::open(dir.path().join("hash"), dir.path().join("hashdata")).expect("open");
        (dir, index)
    }

    #[test]
    fn every_key_is_found_and_unknown_misses() {
        let keys: Vec<&[u8]> = vec![b"<a@x>", b"<b@y>", b"<c@z>", b"<dd@zz>"];
        let (_dir, index) = build_index(&keys);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(index.search_with(key, |id| Some(keys[id as usize])), Some(i as u32));
        }
        assert_eq!(index.search_with(b"<nope@q>", |id| Some(keys[id as usize])), None);
    }

    #[test]
    fn precomputed_hash_matches() {
        let keys: Vec<&[u8]> = vec![b"alpha", b"beta"];
        let (_dir, index) = build_index(&keys);
        let h = key_hash(b"beta");
        assert_eq!(
            index.search_hashed_with(b"beta", h, |id| Some(keys[id as usize])),
            Some(1)
        );
    }

    #[test]
    fn overflowing_bucket_reports_collisions() {
        // Two buckets, alternating slots: the ninth insert into slot 0 is
        // id 16 and must overflow.
        let mut builder = HashIndexBuilder::with_hash_bits(1);
        for i in 0..16 {
            builder.insert_hashed(i, i).expect("within capacity");
        }
        let err = builder.insert_hashed(16, 16).unwrap_err();
        assert!(matches!(err, GlacierError::TooManyCollisions { hashbits: 1 }));
    }

    proptest! {
        #[test]
        fn random_key_sets_round_trip(keys in proptest::collection::hash_set("[a-z]{1,12}", 1..64)) {
            let keys: Vec<Vec<u8>> = keys.into_iter().map(String::into_bytes).collect();
            let refs: Vec<&[u8]> = keys.iter().map(Vec::as_slice).collect();
            let (_dir, index) = build_index(&refs);
            for (i, key) in refs.iter().enumerate() {
                prop_assert_eq!(index.search_with(key, |id| Some(refs[id as usize])), Some(i as u32));
            }
            prop_assert_eq!(index.search_with(b"UPPER", |id| Some(refs[id as usize])), None);
        }
    }
}
