/// Fraction of the first `k` retrieved ids that are relevant.
///
/// The denominator is always `k`, so a short result list is penalized. `k == 0` yields `0.0`.
pub fn precision_at_k(retrieved: &[i64], relevant: &[i64], k: usize) -> f32 {
	if k == 0 {
		return 0.0;
	}

	let hits = retrieved.iter().take(k).filter(|id| relevant.contains(id)).count();

	hits as f32 / k as f32
}
