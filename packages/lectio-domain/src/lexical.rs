//! Query tokenization, bounded lexical scoring, and snippet/highlight extraction.

use std::collections::{BTreeSet, HashMap, HashSet};

use unicode_segmentation::UnicodeSegmentation;

pub const ELLIPSIS: &str = "…";
pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// Splits text into lowercased word tokens in reading order. Repeated words are kept because the
/// lexical score counts term frequency.
pub fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().filter_map(normalize_token).collect()
}

/// Distinct query terms, sorted, for channel queries and metadata matching.
pub fn query_terms(tokens: &[String]) -> BTreeSet<String> {
	tokens.iter().cloned().collect()
}

pub fn lexical_score(query_tokens: &[String], passage_text: &str) -> f32 {
	let wanted: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();

	if wanted.is_empty() {
		return 0.0;
	}

	let mut term_freq: HashMap<String, u32> = HashMap::new();

	for token in tokenize(passage_text) {
		if wanted.contains(token.as_str()) {
			*term_freq.entry(token).or_insert(0) += 1;
		}
	}

	if term_freq.is_empty() {
		return 0.0;
	}

	let saturated: f32 = term_freq
		.values()
		.map(|tf| {
			let tf = *tf as f32;

			tf / (tf + 1.0)
		})
		.sum();

	saturated / wanted.len() as f32
}

/// Returns the window holding the most query-token occurrences. Cut points are marked with
/// [`ELLIPSIS`] and the markers count toward `max_len`; the earliest window wins ties.
pub fn snippet(text: &str, query_tokens: &[String], max_len: usize) -> String {
	let trimmed = text.trim();

	if trimmed.chars().count() <= max_len {
		return trimmed.to_string();
	}
	if max_len == 0 {
		return String::new();
	}

	let marker = ELLIPSIS.chars().count();
	let head = || {
		let head: String = trimmed.chars().take(max_len.saturating_sub(marker)).collect();

		format!("{head}{ELLIPSIS}")
	};
	// Room for the words once both cut points are marked.
	let budget = max_len.saturating_sub(2 * marker);

	if budget == 0 {
		return head();
	}

	let wanted: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
	let words = word_spans(trimmed);
	let hits: Vec<bool> = words
		.iter()
		.map(|word| normalize_token(word.text).is_some_and(|token| wanted.contains(token.as_str())))
		.collect();
	let mut best: Option<(usize, usize, usize)> = None;
	let mut end = 0;
	let mut count = 0;

	for start in 0..words.len() {
		if end < start {
			end = start;
			count = 0;
		}

		while end < words.len() && words[end].char_end - words[start].char_start <= budget {
			if hits[end] {
				count += 1;
			}

			end += 1;
		}

		if end == start {
			continue;
		}
		if best.is_none_or(|(best_count, _, _)| count > best_count) {
			best = Some((count, start, end));
		}
		if hits[start] {
			count -= 1;
		}
	}

	let Some((_, start, end)) = best else {
		return head();
	};
	let byte_start = words[start].byte_start;
	let byte_end = words[end - 1].byte_end;
	let mut out = String::with_capacity(byte_end - byte_start + 2 * ELLIPSIS.len());

	if byte_start > 0 {
		out.push_str(ELLIPSIS);
	}

	out.push_str(&trimmed[byte_start..byte_end]);

	if byte_end < trimmed.len() {
		out.push_str(ELLIPSIS);
	}

	out
}

/// Sentences of `text` that contain a query token, most matches first, each bounded by `max_len`.
pub fn highlight_fragments(text: &str, query_tokens: &[String], max_len: usize) -> Vec<String> {
	let wanted: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();

	if wanted.is_empty() {
		return Vec::new();
	}

	let mut scored: Vec<(usize, usize, String)> = Vec::new();

	for (position, sentence) in text.split_sentence_bounds().enumerate() {
		let matches = sentence
			.unicode_words()
			.filter_map(normalize_token)
			.filter(|token| wanted.contains(token.as_str()))
			.count();

		if matches > 0 {
			scored.push((matches, position, snippet(sentence, query_tokens, max_len)));
		}
	}

	scored.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));

	scored.into_iter().map(|(_, _, fragment)| fragment).collect()
}

/// Wraps query-token matches in `<mark>` tags. Snippets without any match are skipped and at most
/// `max_highlights` strings are returned.
pub fn build_highlights(
	snippets: &[String],
	query_tokens: &[String],
	max_highlights: usize,
) -> Vec<String> {
	let wanted: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
	let mut out = Vec::new();

	if wanted.is_empty() {
		return out;
	}

	for snippet in snippets {
		if out.len() >= max_highlights {
			break;
		}

		let mut marked = String::with_capacity(snippet.len() + 16);
		let mut cursor = 0;
		let mut matched = false;

		for (offset, word) in snippet.unicode_word_indices() {
			let Some(token) = normalize_token(word) else { continue };

			if !wanted.contains(token.as_str()) {
				continue;
			}

			marked.push_str(&snippet[cursor..offset]);
			marked.push_str(MARK_OPEN);
			marked.push_str(word);
			marked.push_str(MARK_CLOSE);

			cursor = offset + word.len();
			matched = true;
		}

		if matched {
			marked.push_str(&snippet[cursor..]);
			out.push(marked);
		}
	}

	out
}

fn normalize_token(word: &str) -> Option<String> {
	let token: String =
		word.chars().filter(|ch| ch.is_alphanumeric()).flat_map(char::to_lowercase).collect();

	if token.is_empty() { None } else { Some(token) }
}

struct WordSpan<'a> {
	text: &'a str,
	byte_start: usize,
	byte_end: usize,
	char_start: usize,
	char_end: usize,
}

fn word_spans(text: &str) -> Vec<WordSpan<'_>> {
	let mut out = Vec::new();
	let mut last_byte = 0;
	let mut last_char = 0;

	for (byte_start, word) in text.unicode_word_indices() {
		let char_start = last_char + text[last_byte..byte_start].chars().count();
		let char_end = char_start + word.chars().count();
		let byte_end = byte_start + word.len();

		out.push(WordSpan { text: word, byte_start, byte_end, char_start, char_end });

		last_byte = byte_end;
		last_char = char_end;
	}

	out
}
