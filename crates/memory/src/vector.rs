//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and threshold-filtered ranking, shared by
//! the in-memory and SQLite stores.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Floor for cross-session matches; anti-correlated messages are never related.
pub const MIN_RELATED_SIMILARITY: f32 = 0.0;

/// Rank candidates by cosine similarity to `query`.
///
/// Keeps candidates scoring at or above `min_score`, sorted by descending
/// similarity (ties keep input order), truncated to `limit`.
pub fn rank_by_similarity<T>(
    candidates: impl IntoIterator<Item = (T, Vec<f32>)>,
    query: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .filter_map(|(item, embedding)| {
            let sim = cosine_similarity(&embedding, query);
            (sim >= min_score).then_some((item, sim))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Serialize an embedding vector to little-endian bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian bytes into an embedding vector.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
