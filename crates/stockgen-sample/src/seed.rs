use stockgen_core::DependencyKey;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
const FIELD_SEPARATOR: u8 = 0x1f;

/// Stable FNV-1a hash of `key` folded into `seed`.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    fold_bytes(seed ^ FNV_OFFSET, key.as_bytes())
}

/// Seed of one quota task.
///
/// Every input that identifies the group takes part. The worker that runs
/// the task does not.
pub fn task_seed(
    base_seed: u64,
    characteristic: &str,
    key: &DependencyKey,
    generation: usize,
    group_size: usize,
) -> u64 {
    let mut hash = hash_seed(base_seed, characteristic);
    for value in key.values() {
        hash = fold_bytes(hash, &[FIELD_SEPARATOR]);
        hash = fold_bytes(hash, value.as_bytes());
    }
    hash = fold_bytes(hash, &[FIELD_SEPARATOR]);
    hash = fold_bytes(hash, &(generation as u64).to_le_bytes());
    fold_bytes(hash, &(group_size as u64).to_le_bytes())
}

fn fold_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
