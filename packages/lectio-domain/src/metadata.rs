use std::collections::BTreeSet;

use serde_json::Value;

use crate::lexical;

/// Flattens nested metadata into a term set. Object keys are ignored, string leaves are tokenized,
/// and numbers and booleans contribute their literal form.
pub fn metadata_terms(metadata: &Value) -> BTreeSet<String> {
	let mut out = BTreeSet::new();

	collect_terms(metadata, &mut out);

	out
}

/// Jaccard overlap between query terms and metadata terms.
pub fn metadata_match_score(query_terms: &BTreeSet<String>, metadata_terms: &BTreeSet<String>) -> f32 {
	if query_terms.is_empty() || metadata_terms.is_empty() {
		return 0.0;
	}

	let shared = query_terms.intersection(metadata_terms).count();

	if shared == 0 {
		return 0.0;
	}

	let union = query_terms.len() + metadata_terms.len() - shared;

	shared as f32 / union as f32
}

fn collect_terms(value: &Value, out: &mut BTreeSet<String>) {
	match value {
		Value::Null => {},
		Value::Bool(flag) => {
			out.insert(flag.to_string());
		},
		Value::Number(number) => {
			out.insert(number.to_string());
		},
		Value::String(text) => out.extend(lexical::tokenize(text)),
		Value::Array(items) =>
			for item in items {
				collect_terms(item, out);
			},
		Value::Object(map) =>
			for item in map.values() {
				collect_terms(item, out);
			},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn terms(items: &[&str]) -> BTreeSet<String> {
		items.iter().map(|item| item.to_string()).collect()
	}

	#[test]
	fn flattens_nested_lists_and_maps() {
		let metadata = serde_json::json!({
			"tags": ["Grace", "Covenant theology"],
			"source": { "year": 1536, "peer_reviewed": true, "note": null },
		});

		assert_eq!(
			metadata_terms(&metadata),
			terms(&["1536", "covenant", "grace", "theology", "true"])
		);
	}

	#[test]
	fn flattening_ignores_order() {
		let left = serde_json::json!({ "a": ["x", "y"], "b": "z" });
		let right = serde_json::json!({ "b": ["z"], "a": ["y", "x"] });

		assert_eq!(metadata_terms(&left), metadata_terms(&right));
	}

	#[test]
	fn jaccard_overlap() {
		let query = terms(&["grace", "faith"]);
		let meta = terms(&["grace", "works", "law"]);

		assert!((metadata_match_score(&query, &meta) - 0.25).abs() < 1e-6);
		assert_eq!(metadata_match_score(&query, &terms(&["law"])), 0.0);
		assert_eq!(metadata_match_score(&BTreeSet::new(), &meta), 0.0);
		assert_eq!(metadata_match_score(&query, &BTreeSet::new()), 0.0);
	}
}
