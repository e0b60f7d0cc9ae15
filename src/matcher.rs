use crate::models::identity::IdentityRecord;

/// Euclidean (L2) distance between two embeddings.
///
/// Returns `None` when the dimensionalities differ, so callers decide whether
/// to skip or fail.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

#[derive(Debug, Clone, Copy)]
pub struct MatchHit<'a> {
    pub record: &'a IdentityRecord,
    pub distance: f32,
}

/// Linear scan of the gallery, O(n·d) per probe.
///
/// Returns the FIRST record encountered whose distance falls strictly under
/// `threshold`; the scan stops there and does not look for a globally closer
/// record. An empty gallery is a clean no-match. A stored record whose
/// dimensionality differs from the probe is skipped and the scan continues.
pub fn match_probe<'a>(
    probe: &[f32],
    gallery: &'a [IdentityRecord],
    threshold: f32,
) -> Option<MatchHit<'a>> {
    for record in gallery {
        let Some(distance) = euclidean_distance(probe, &record.embedding) else {
            tracing::warn!(
                "skipping {}: embedding dim {} does not match probe dim {}",
                record.name,
                record.embedding.len(),
                probe.len()
            );
            continue;
        };
        tracing::debug!("comparing against {}: distance {:.4}", record.name, distance);
        if distance < threshold {
            return Some(MatchHit { record, distance });
        }
    }
    None
}
