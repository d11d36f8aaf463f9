use unicode_normalization::UnicodeNormalization;

/// Instruction-override phrases, checked in this order.
pub const DANGEROUS_PHRASES: [&str; 4] = [
	"ignore previous instructions",
	"disregard prior instructions",
	"system prompt",
	"you are now",
];

/// Returns the first phrase of [`DANGEROUS_PHRASES`] found in `text`, or `None` when the text is
/// clean.
///
/// Matching is a case-insensitive substring search over the NFKC form of the input, so full-width
/// and compatibility variants of the phrases are caught too. Ordinary questions that mention a
/// phrase (for example "what is a system prompt?") are flagged as well.
pub fn screen(text: &str) -> Option<&'static str> {
	let normalized: String = text.nfkc().collect();
	let lower = normalized.to_lowercase();

	DANGEROUS_PHRASES.into_iter().find(|phrase| lower.contains(phrase))
}
