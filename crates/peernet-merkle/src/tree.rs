//! Merkle fragment tree (spec §4.J)
//!
//! Fragments a file into fixed-size chunks, hashes each with BLAKE3-256, and
//! folds the leaves bottom-up into a root hash. A lone right-most node at
//! any level is promoted unchanged rather than hashed against itself —
//! preserved exactly from the uneven-leaf loop boundary in
//! `examples/original_source/fragment/Merkle Tree.go`'s
//! `calculateMiddleHashes` (`n+1 <= len(inputHashes)-1`).

use std::io::Read;

use crate::error::{MerkleError, MerkleResult};

pub type Hash32 = [u8; 32];

/// Which side of the fold a verification hash sits on (spec §4.J
/// `CreateVerification`/`MerkleVerify`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

fn hash_pair(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

fn fragment_count_for(file_size: u64, fragment_size: u64) -> u64 {
    file_size.div_ceil(fragment_size)
}

/// A built Merkle tree over a file's fragments.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    file_size: u64,
    fragment_size: u64,
    fragment_count: u64,
    fragment_hashes: Vec<Hash32>,
    /// Intermediate levels bottom-up; `middle_hashes[0]` folds
    /// `fragment_hashes`, each subsequent level folds the one before it.
    middle_hashes: Vec<Vec<Hash32>>,
    root_hash: Hash32,
}

impl MerkleTree {
    /// Build a tree by reading exactly `file_size` bytes from `reader` in
    /// `fragment_size`-sized chunks (the last chunk may be short).
    pub fn build<R: Read>(
        file_size: u64,
        fragment_size: u64,
        reader: &mut R,
    ) -> MerkleResult<Self> {
        if fragment_size == 0 {
            return Err(MerkleError::ZeroFragmentSize);
        }

        let fragment_count = fragment_count_for(file_size, fragment_size);

        // Special case: empty input.
        if fragment_count == 0 {
            return Ok(MerkleTree {
                file_size,
                fragment_size,
                fragment_count,
                fragment_hashes: Vec::new(),
                middle_hashes: Vec::new(),
                root_hash: *blake3::hash(&[]).as_bytes(),
            });
        }

        // Special case: single fragment, no path needed.
        if fragment_count == 1 {
            let mut data = vec![0u8; file_size as usize];
            reader
                .read_exact(&mut data)
                .map_err(|_| MerkleError::ShortRead)?;
            return Ok(MerkleTree {
                file_size,
                fragment_size,
                fragment_count,
                fragment_hashes: Vec::new(),
                middle_hashes: Vec::new(),
                root_hash: *blake3::hash(&data).as_bytes(),
            });
        }

        let mut fragment_hashes = Vec::with_capacity(fragment_count as usize);
        let mut remaining = file_size;
        let mut buf = vec![0u8; fragment_size as usize];

        for _ in 0..fragment_count {
            let this_fragment = fragment_size.min(remaining) as usize;
            reader
                .read_exact(&mut buf[..this_fragment])
                .map_err(|_| MerkleError::ShortRead)?;
            fragment_hashes.push(*blake3::hash(&buf[..this_fragment]).as_bytes());
            remaining -= this_fragment as u64;
        }

        let mut tree = MerkleTree {
            file_size,
            fragment_size,
            fragment_count,
            fragment_hashes,
            middle_hashes: Vec::new(),
            root_hash: [0u8; 32],
        };
        tree.calculate_middle_hashes();
        Ok(tree)
    }

    /// Fold `fragment_hashes` and then each middle level upward until a
    /// single root hash remains, promoting a lone right-most node unchanged
    /// at every level.
    fn calculate_middle_hashes(&mut self) {
        let mut input = self.fragment_hashes.clone();

        loop {
            let mut folded = Vec::with_capacity(input.len().div_ceil(2));
            let mut n = 0;
            while n + 1 <= input.len() - 1 {
                folded.push(hash_pair(&input[n], &input[n + 1]));
                n += 2;
            }
            if input.len() % 2 != 0 {
                folded.push(input[input.len() - 1]);
            }

            if folded.len() == 1 {
                self.root_hash = folded[0];
                return;
            }

            self.middle_hashes.push(folded.clone());
            input = folded;
        }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn fragment_size(&self) -> u64 {
        self.fragment_size
    }

    pub fn fragment_count(&self) -> u64 {
        self.fragment_count
    }

    pub fn root_hash(&self) -> Hash32 {
        self.root_hash
    }

    pub fn fragment_hash(&self, fragment: u64) -> Option<Hash32> {
        self.fragment_hashes.get(fragment as usize).copied()
    }

    /// Verification path for `fragment`, from the leaf level upward,
    /// excluding the root (spec §4.J `CreateVerification`). Empty for the
    /// 0- and 1-fragment special cases, or an out-of-range fragment index.
    pub fn create_verification(&self, fragment: u64) -> Vec<(Side, Hash32)> {
        if self.fragment_count <= 1 || fragment >= self.fragment_count {
            return Vec::new();
        }

        let mut path = Vec::new();
        let mut index = fragment as usize;

        sibling_at_level(&self.fragment_hashes, index, &mut path);
        for level in &self.middle_hashes {
            index /= 2;
            sibling_at_level(level, index, &mut path);
        }

        path
    }
}

/// Push this level's sibling for `index`, unless `index` is the promoted
/// lone right-most node (no sibling to hash against at this level).
fn sibling_at_level(level: &[Hash32], index: usize, path: &mut Vec<(Side, Hash32)>) {
    let is_lone_rightmost = index == level.len() - 1 && index % 2 == 0;
    if is_lone_rightmost {
        return;
    }
    if index % 2 == 0 {
        path.push((Side::Right, level[index + 1]));
    } else {
        path.push((Side::Left, level[index - 1]));
    }
}

/// Fold `data_hash` up through `verification` and compare against
/// `root_hash` (spec §4.J `MerkleVerify`).
pub fn merkle_verify(root_hash: &Hash32, data_hash: Hash32, verification: &[(Side, Hash32)]) -> bool {
    let mut current = data_hash;
    for (side, sibling) in verification {
        current = match side {
            Side::Left => hash_pair(sibling, &current),
            Side::Right => hash_pair(&current, sibling),
        };
    }
    &current == root_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn hash_of(data: &[u8]) -> Hash32 {
        *blake3::hash(data).as_bytes()
    }

    #[test]
    fn empty_file_root_is_blake3_of_empty_string() {
        let tree = MerkleTree::build(0, 16, &mut Cursor::new(Vec::<u8>::new())).unwrap();
        assert_eq!(tree.fragment_count(), 0);
        assert_eq!(tree.root_hash(), hash_of(b""));
        assert!(tree.create_verification(0).is_empty());
    }

    #[test]
    fn single_fragment_root_is_direct_hash_no_path() {
        let data = b"small file contents".to_vec();
        let tree = MerkleTree::build(data.len() as u64, 64, &mut Cursor::new(data.clone())).unwrap();
        assert_eq!(tree.fragment_count(), 1);
        assert_eq!(tree.root_hash(), hash_of(&data));
        assert!(tree.create_verification(0).is_empty());
    }

    #[test]
    fn zero_fragment_size_is_rejected() {
        let err = MerkleTree::build(10, 0, &mut Cursor::new(vec![0u8; 10])).unwrap_err();
        assert!(matches!(err, MerkleError::ZeroFragmentSize));
    }

    #[test]
    fn short_read_is_rejected() {
        let err = MerkleTree::build(100, 10, &mut Cursor::new(vec![0u8; 5])).unwrap_err();
        assert!(matches!(err, MerkleError::ShortRead));
    }

    #[test]
    fn three_fragments_uneven_promotes_lone_leaf() {
        // 3 fragments: level0=[h0,h1,h2]; level1=[H(h0||h1), h2]; root=H(H(h0||h1)||h2).
        let data = vec![1u8; 24];
        let tree = MerkleTree::build(24, 8, &mut Cursor::new(data.clone())).unwrap();
        assert_eq!(tree.fragment_count(), 3);

        let h0 = hash_of(&data[0..8]);
        let h1 = hash_of(&data[8..16]);
        let h2 = hash_of(&data[16..24]);
        let middle = hash_pair(&h0, &h1);
        let root = hash_pair(&middle, &h2);
        assert_eq!(tree.root_hash(), root);

        let verification = tree.create_verification(2);
        assert_eq!(verification, vec![(Side::Left, middle)]);
        assert!(merkle_verify(&tree.root_hash(), h2, &verification));
    }

    #[test]
    fn verification_path_round_trips_for_every_fragment() {
        for &count in &[2u64, 3, 4, 5, 7, 8] {
            let fragment_size = 8u64;
            let file_size = count * fragment_size;
            let data: Vec<u8> = (0..file_size).map(|i| (i % 251) as u8).collect();
            let tree = MerkleTree::build(file_size, fragment_size, &mut Cursor::new(data.clone())).unwrap();

            for fragment in 0..count {
                let start = (fragment * fragment_size) as usize;
                let end = start + fragment_size as usize;
                let data_hash = hash_of(&data[start..end]);
                let verification = tree.create_verification(fragment);
                assert!(
                    merkle_verify(&tree.root_hash(), data_hash, &verification),
                    "fragment {fragment} of {count} failed to verify"
                );
            }
        }
    }

    #[test]
    fn tampered_data_fails_verification() {
        let data = vec![7u8; 40];
        let tree = MerkleTree::build(40, 8, &mut Cursor::new(data)).unwrap();
        let verification = tree.create_verification(0);
        let wrong_hash = hash_of(b"not the real fragment");
        assert!(!merkle_verify(&tree.root_hash(), wrong_hash, &verification));
    }

    #[test]
    fn out_of_range_fragment_has_empty_verification() {
        let data = vec![0u8; 32];
        let tree = MerkleTree::build(32, 8, &mut Cursor::new(data)).unwrap();
        assert!(tree.create_verification(tree.fragment_count()).is_empty());
    }
}
