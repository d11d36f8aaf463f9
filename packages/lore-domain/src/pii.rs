//! Pattern-based PII scrubbing for text headed to logs.

use std::sync::LazyLock;

use regex::Regex;

pub const EMAIL_TOKEN: &str = "[EMAIL]";
pub const CARD_TOKEN: &str = "[CARD]";
pub const PHONE_TOKEN: &str = "[PHONE]";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap_or_else(|_| unreachable!())
});
static CARD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\b(?:\d[ -]*?){13,19}\b").unwrap_or_else(|_| unreachable!())
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?:\+?\d{1,3}[- .]?)?\(?\d{3}\)?[- .]?\d{3}[- .]?\d{4}")
		.unwrap_or_else(|_| unreachable!())
});

/// Replaces emails, card-like digit runs, and phone numbers with fixed tokens.
///
/// Order matters: cards are scrubbed before phones so a 16-digit run is never split into a phone
/// number plus leftover digits. A replacement token can open a word boundary in front of digits a
/// pass left behind, so the passes repeat until the text stops changing. Every change removes
/// digits or an `@`, and no token contains either, so the loop ends and the result is a fixed
/// point.
pub fn scrub(text: &str) -> String {
	let mut current = scrub_once(text);

	loop {
		let next = scrub_once(&current);

		if next == current {
			return current;
		}

		current = next;
	}
}

fn scrub_once(text: &str) -> String {
	let text = EMAIL.replace_all(text, EMAIL_TOKEN);
	let text = CARD.replace_all(&text, CARD_TOKEN);

	PHONE.replace_all(&text, PHONE_TOKEN).into_owned()
}
