//! BLAKE3 hashing for cache keys and compact ids.

#[inline]
pub fn hash_query(query: &str) -> [u8; 32] {
    *blake3::hash(query.as_bytes()).as_bytes()
}

/// Computes a 64-bit id from the input, truncated from a 256-bit BLAKE3 hash.
///
/// 64 bits is plenty for cache-entry and response ids: at a million live
/// entries the birthday-bound collision probability is ~0.00003%, and a
/// collision degrades to a cache miss rather than a wrong answer because
/// every semantic hit is revalidated against live retrieval.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_query_determinism() {
        let query = "What are the beard grooming standards?";

        let hash1 = hash_query(query);
        let hash2 = hash_query(query);

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_query_uniqueness() {
        let queries = [
            "What are the beard grooming standards?",
            "What are the uniform regulations?",
            "what are the beard grooming standards?",
            "What are the beard grooming standards? ",
        ];

        let hashes: Vec<_> = queries.iter().map(|q| hash_query(q)).collect();
        let unique: HashSet<_> = hashes.iter().collect();

        assert_eq!(unique.len(), queries.len());
    }

    #[test]
    fn test_hash_query_output_size() {
        assert_eq!(hash_query("test").len(), 32);
    }

    #[test]
    fn test_hash_query_empty_string() {
        let hash = hash_query("");
        assert!(!hash.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hash_to_u64_determinism() {
        let data = b"query-id-12345";

        assert_eq!(hash_to_u64(data), hash_to_u64(data));
    }

    #[test]
    fn test_hash_to_u64_uniqueness() {
        let inputs = [
            b"chunk-001".as_slice(),
            b"chunk-002".as_slice(),
            b"CHUNK-001".as_slice(),
            b"chunk-001 ".as_slice(),
        ];

        let hashes: Vec<_> = inputs.iter().map(|i| hash_to_u64(i)).collect();
        let unique: HashSet<_> = hashes.iter().collect();

        assert_eq!(unique.len(), inputs.len());
    }
}
