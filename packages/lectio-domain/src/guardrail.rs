//! Inclusion predicates shared by every retrieval channel and the fallback path.
//!
//! Each predicate is a no-op when its constraint is unset. When a constraint is set and the
//! document lacks the field, the document is excluded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailFilters {
	#[serde(default)]
	pub authors: Vec<String>,
	#[serde(default)]
	pub traditions: Vec<String>,
	#[serde(default)]
	pub topic_domains: Vec<String>,
}
impl GuardrailFilters {
	/// Trims, lowercases, and drops blank entries so pushdown queries and in-process checks compare
	/// the same values.
	pub fn normalized(&self) -> Self {
		Self {
			authors: normalize_values(&self.authors),
			traditions: normalize_values(&self.traditions),
			topic_domains: normalize_values(&self.topic_domains),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.authors.iter().all(|value| value.trim().is_empty())
			&& self.traditions.iter().all(|value| value.trim().is_empty())
			&& self.topic_domains.iter().all(|value| value.trim().is_empty())
	}
}

/// The document fields guardrails inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttributes {
	#[serde(default)]
	pub authors: Vec<String>,
	#[serde(default)]
	pub tradition: Option<String>,
	#[serde(default)]
	pub topic_domains: Vec<String>,
}

pub fn passes_filters(document: &DocumentAttributes, filters: &GuardrailFilters) -> bool {
	passes_author_filter(document, &filters.authors)
		&& matches_tradition(document, &filters.traditions)
		&& matches_topic_domain(document, &filters.topic_domains)
}

pub fn passes_author_filter(document: &DocumentAttributes, allowed: &[String]) -> bool {
	any_match(allowed, document.authors.iter().map(String::as_str))
}

pub fn matches_tradition(document: &DocumentAttributes, traditions: &[String]) -> bool {
	any_match(traditions, document.tradition.as_deref().into_iter())
}

pub fn matches_topic_domain(document: &DocumentAttributes, domains: &[String]) -> bool {
	any_match(domains, document.topic_domains.iter().map(String::as_str))
}

fn any_match<'a>(constraint: &[String], values: impl Iterator<Item = &'a str>) -> bool {
	let wanted = normalize_values(constraint);

	if wanted.is_empty() {
		return true;
	}

	// An absent field yields no values and therefore never matches.
	values
		.map(|value| value.trim().to_lowercase())
		.filter(|value| !value.is_empty())
		.any(|value| wanted.contains(&value))
}

fn normalize_values(values: &[String]) -> Vec<String> {
	values
		.iter()
		.map(|value| value.trim().to_lowercase())
		.filter(|value| !value.is_empty())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn document(authors: &[&str], tradition: Option<&str>, domains: &[&str]) -> DocumentAttributes {
		DocumentAttributes {
			authors: authors.iter().map(|value| value.to_string()).collect(),
			tradition: tradition.map(str::to_string),
			topic_domains: domains.iter().map(|value| value.to_string()).collect(),
		}
	}

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn unset_constraints_pass_everything() {
		let filters = GuardrailFilters::default();

		assert!(passes_filters(&DocumentAttributes::default(), &filters));
		assert!(passes_filters(&document(&["Jane Doe"], Some("Reformed"), &["soteriology"]), &filters));
	}

	#[test]
	fn blank_constraints_count_as_unset() {
		let filters = GuardrailFilters { authors: strings(&["  "]), ..Default::default() };

		assert!(filters.is_empty());
		assert!(passes_filters(&DocumentAttributes::default(), &filters));
	}

	#[test]
	fn author_filter_is_case_insensitive() {
		let doc = document(&["JANE DOE", "John Roe"], None, &[]);

		assert!(passes_author_filter(&doc, &strings(&["jane doe"])));
		assert!(!passes_author_filter(&doc, &strings(&["Richard Miles"])));
	}

	#[test]
	fn constrained_missing_fields_are_excluded() {
		let bare = DocumentAttributes::default();

		assert!(!passes_author_filter(&bare, &strings(&["Jane Doe"])));
		assert!(!matches_tradition(&bare, &strings(&["Catholic"])));
		assert!(!matches_topic_domain(&bare, &strings(&["ethics"])));
		assert!(!matches_tradition(&document(&[], Some("   "), &[]), &strings(&["Catholic"])));
	}

	#[test]
	fn all_predicates_must_pass() {
		let doc = document(&["Jane Doe"], Some("Reformed"), &["Soteriology"]);
		let passing = GuardrailFilters {
			authors: strings(&["jane doe"]),
			traditions: strings(&["reformed", "lutheran"]),
			topic_domains: strings(&["soteriology"]),
		};
		let failing = GuardrailFilters { traditions: strings(&["Catholic"]), ..passing.clone() };

		assert!(passes_filters(&doc, &passing));
		assert!(!passes_filters(&doc, &failing));
	}

	#[test]
	fn normalized_lowercases_and_drops_blanks() {
		let filters = GuardrailFilters {
			authors: strings(&[" Jane Doe ", ""]),
			traditions: strings(&["Reformed"]),
			topic_domains: Vec::new(),
		};

		assert_eq!(
			filters.normalized(),
			GuardrailFilters {
				authors: strings(&["jane doe"]),
				traditions: strings(&["reformed"]),
				topic_domains: Vec::new(),
			}
		);
	}
}
