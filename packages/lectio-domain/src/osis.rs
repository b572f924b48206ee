//! OSIS-style scripture references (`John.1.1`, `Gen.1-Gen.3`, `Rom.8.28-30`) expanded into
//! comparable verse-id ranges.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Verse ids are `book * BOOK_STRIDE + chapter * CHAPTER_STRIDE + verse`.
pub const BOOK_STRIDE: u32 = 1_000_000;
pub const CHAPTER_STRIDE: u32 = 1_000;
pub const MAX_CHAPTER: u32 = 999;
pub const MAX_VERSE: u32 = 999;

const BOOKS: [&str; 66] = [
	"Gen", "Exod", "Lev", "Num", "Deut", "Josh", "Judg", "Ruth", "1Sam", "2Sam", "1Kgs", "2Kgs",
	"1Chr", "2Chr", "Ezra", "Neh", "Esth", "Job", "Ps", "Prov", "Eccl", "Song", "Isa", "Jer",
	"Lam", "Ezek", "Dan", "Hos", "Joel", "Amos", "Obad", "Jonah", "Mic", "Nah", "Hab", "Zeph",
	"Hag", "Zech", "Mal", "Matt", "Mark", "Luke", "John", "Acts", "Rom", "1Cor", "2Cor", "Gal",
	"Eph", "Phil", "Col", "1Thess", "2Thess", "1Tim", "2Tim", "Titus", "Phlm", "Heb", "Jas",
	"1Pet", "2Pet", "1John", "2John", "3John", "Jude", "Rev",
];

static OSIS_POINT: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"^(?P<book>[1-4]?[A-Za-z]+)(?:\.(?P<chapter>\d+)(?:\.(?P<verse>\d+))?)?$").ok()
});
static CHAPTER_VERSE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^(?P<chapter>\d+)\.(?P<verse>\d+)$").ok());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid OSIS reference {reference:?}: {message}")]
pub struct InvalidReference {
	pub reference: String,
	pub message: String,
}

/// An inclusive verse-id interval, or nothing when the reference names an unknown book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OsisRange {
	Empty,
	Span { start: u32, end: u32 },
}
impl OsisRange {
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	pub fn bounds(&self) -> Option<(u32, u32)> {
		match self {
			Self::Empty => None,
			Self::Span { start, end } => Some((*start, *end)),
		}
	}

	pub fn intersects(&self, other: &Self) -> bool {
		match (self.bounds(), other.bounds()) {
			(Some((a_start, a_end)), Some((b_start, b_end))) => a_start <= b_end && b_start <= a_end,
			_ => false,
		}
	}

	/// Widens the span by `chapters` on each side without leaving the book.
	pub fn widen(&self, chapters: u32) -> Self {
		let Some((start, end)) = self.bounds() else { return Self::Empty };
		let delta = chapters.saturating_mul(CHAPTER_STRIDE);
		let book_start = start / BOOK_STRIDE * BOOK_STRIDE;
		let book_end = end / BOOK_STRIDE * BOOK_STRIDE + BOOK_STRIDE - 1;

		Self::Span {
			start: start.saturating_sub(delta).max(book_start),
			end: end.saturating_add(delta).min(book_end),
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct Point {
	book: Option<u32>,
	chapter: Option<u32>,
	verse: Option<u32>,
}

pub fn book_index(code: &str) -> Option<u32> {
	BOOKS.iter().position(|book| book.eq_ignore_ascii_case(code)).map(|idx| idx as u32 + 1)
}

pub fn expand_reference(reference: &str) -> Result<OsisRange, InvalidReference> {
	let trimmed = reference.trim();
	let invalid = |message: &str| InvalidReference {
		reference: reference.to_string(),
		message: message.to_string(),
	};

	if trimmed.is_empty() {
		return Err(invalid("reference must not be empty."));
	}

	let (start_raw, end_raw) = match trimmed.split_once('-') {
		Some((start, end)) => (start.trim(), Some(end.trim())),
		None => (trimmed, None),
	};
	let start = parse_point(start_raw).map_err(|message| invalid(&message))?;
	let end = match end_raw {
		None => None,
		Some("") => return Err(invalid("range end must not be empty.")),
		Some(raw) => Some(parse_range_end(raw, &start).map_err(|message| invalid(&message))?),
	};

	if let Some(end) = end.as_ref()
		&& end.book != start.book
	{
		return Err(invalid("ranges must not cross books."));
	}

	let Some(book) = start.book else { return Ok(OsisRange::Empty) };
	let first = verse_id(book, start.chapter.unwrap_or(1), start.verse.unwrap_or(1));
	let last_point = end.unwrap_or(start);
	let last_chapter = last_point.chapter.unwrap_or(MAX_CHAPTER);
	let last_verse = match (last_point.chapter, last_point.verse) {
		(_, Some(verse)) => verse,
		_ => MAX_VERSE,
	};
	let last = verse_id(book, last_chapter, last_verse);

	if last < first {
		return Err(invalid("range end precedes range start."));
	}

	Ok(OsisRange::Span { start: first, end: last })
}

/// `Some(0.0)` when the ranges intersect, otherwise the verse-id gap in chapter units. `None` is
/// the "no reference" sentinel and must not be treated as a penalty.
pub fn reference_distance(query: &OsisRange, candidate: &OsisRange) -> Option<f32> {
	let (q_start, q_end) = query.bounds()?;
	let (c_start, c_end) = candidate.bounds()?;

	if q_start <= c_end && c_start <= q_end {
		return Some(0.0);
	}

	let gap = if c_start > q_end { c_start - q_end } else { q_start - c_end };

	Some(gap as f32 / CHAPTER_STRIDE as f32)
}

pub fn reference_matches(query: &OsisRange, candidate: &OsisRange) -> bool {
	query.intersects(candidate)
}

fn verse_id(book: u32, chapter: u32, verse: u32) -> u32 {
	book * BOOK_STRIDE + chapter * CHAPTER_STRIDE + verse
}

fn parse_point(raw: &str) -> Result<Point, String> {
	let Some(re) = OSIS_POINT.as_ref() else {
		return Err("reference pattern is unavailable.".to_string());
	};
	let Some(caps) = re.captures(raw) else {
		return Err(format!("'{raw}' is not Book[.Chapter[.Verse]]."));
	};
	let book = caps.name("book").and_then(|m| book_index(m.as_str()));
	let chapter =
		caps.name("chapter").map(|m| parse_number(m.as_str(), MAX_CHAPTER, "chapter")).transpose()?;
	let verse =
		caps.name("verse").map(|m| parse_number(m.as_str(), MAX_VERSE, "verse")).transpose()?;

	Ok(Point { book, chapter, verse })
}

fn parse_range_end(raw: &str, start: &Point) -> Result<Point, String> {
	if raw.starts_with(|ch: char| ch.is_ascii_alphabetic())
		|| raw.len() > 1 && raw.as_bytes()[1].is_ascii_alphabetic()
	{
		return parse_point(raw);
	}

	if let Some(re) = CHAPTER_VERSE.as_ref()
		&& let Some(caps) = re.captures(raw)
	{
		let chapter = parse_number(&caps["chapter"], MAX_CHAPTER, "chapter")?;
		let verse = parse_number(&caps["verse"], MAX_VERSE, "verse")?;

		return Ok(Point { book: start.book, chapter: Some(chapter), verse: Some(verse) });
	}

	if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
		return Err(format!("'{raw}' is not a valid range end."));
	}

	match (start.chapter, start.verse) {
		(Some(chapter), Some(_)) => {
			let verse = parse_number(raw, MAX_VERSE, "verse")?;

			Ok(Point { book: start.book, chapter: Some(chapter), verse: Some(verse) })
		},
		(Some(_), None) => {
			let chapter = parse_number(raw, MAX_CHAPTER, "chapter")?;

			Ok(Point { book: start.book, chapter: Some(chapter), verse: None })
		},
		_ => Err("a bare number cannot end a whole-book reference.".to_string()),
	}
}

fn parse_number(raw: &str, max: u32, label: &str) -> Result<u32, String> {
	let value: u32 = raw.parse().map_err(|_| format!("{label} '{raw}' is not a number."))?;

	if value == 0 || value > max {
		return Err(format!("{label} must be in the range 1-{max}."));
	}

	Ok(value)
}
