//! Merkle commitment over a set of manifest entries.
//!
//! Leaf encoding:
//!
//! ```text
//! metadata_hash = SHA-256(canonical_json(metadata))
//! leaf          = SHA-256(dataset_id "|" blob_id "|" (path or "") "|" hex(metadata_hash))
//! ```
//!
//! The fields are joined with `|` rather than length-prefixed. Two entries
//! whose ids or paths contain `|` can in principle collide; this is a known
//! simplification of the encoding and is kept for compatibility with stored
//! roots.
//!
//! Leaves are ordered by entry id, then folded pairwise (`left || right`).
//! An odd node at the end of a level is promoted unchanged. The root of an
//! empty set is `SHA-256("")`.

use crate::canonical::canonical_metadata;
use crate::crypto::Sha256Hash;
use crate::manifest::ManifestEntry;

/// Root of the empty manifest: SHA-256 of the empty string.
pub const EMPTY_ROOT: Sha256Hash = Sha256Hash::from_bytes([
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
]);

/// SHA-256 of an entry's canonical metadata.
pub fn metadata_hash(entry: &ManifestEntry) -> Sha256Hash {
    Sha256Hash::hash(canonical_metadata(&entry.metadata).as_bytes())
}

/// Leaf hash of a single entry.
pub fn leaf_hash(entry: &ManifestEntry) -> Sha256Hash {
    let metadata_hash = metadata_hash(entry).to_hex();
    let path = entry.path.as_deref().unwrap_or("");
    Sha256Hash::hash_parts(&[
        entry.dataset_id.as_str().as_bytes(),
        b"|",
        entry.blob_id.as_str().as_bytes(),
        b"|",
        path.as_bytes(),
        b"|",
        metadata_hash.as_bytes(),
    ])
}

/// Fold already-ordered leaves into a root.
pub fn fold_leaves(mut level: Vec<Sha256Hash>) -> Sha256Hash {
    if level.is_empty() {
        return EMPTY_ROOT;
    }
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let node = match pair {
                [left, right] => Sha256Hash::hash_parts(&[left.as_bytes(), right.as_bytes()]),
                // Odd node out: promoted, not duplicated.
                _ => pair[0],
            };
            next.push(node);
        }
        level = next;
    }
    level[0]
}

/// Compute the manifest root of a set of entries.
///
/// Invariant under permutation of `entries`: they are ordered by id first.
pub fn compute_manifest_root(entries: &[ManifestEntry]) -> Sha256Hash {
    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    fold_leaves(sorted.into_iter().map(leaf_hash).collect())
}

/// Recompute the root and compare it with `expected`.
///
/// Roots are public values, so a plain comparison is sufficient.
pub fn verify_manifest_root(entries: &[ManifestEntry], expected: &Sha256Hash) -> bool {
    compute_manifest_root(entries) == *expected
}
