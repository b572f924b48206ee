use lectio_domain::{
	guardrail::{self, DocumentAttributes, GuardrailFilters},
	lexical, metadata,
	osis::{self, OsisRange},
};

#[test]
fn lexical_score_is_symmetric_under_case_and_punctuation() {
	let plain = lexical::tokenize("grace and truth");
	let noisy = lexical::tokenize("GRACE, and -- Truth!");
	let passage = "Grace and truth came through Jesus Christ.";

	assert_eq!(plain, noisy);
	assert_eq!(
		lexical::lexical_score(&plain, passage),
		lexical::lexical_score(&noisy, &passage.to_uppercase())
	);
}

#[test]
fn query_terms_deduplicate_tokens() {
	let tokens = lexical::tokenize("grace upon grace");
	let terms = lexical::query_terms(&tokens);

	assert_eq!(tokens.len(), 3);
	assert_eq!(terms.len(), 2);
}

#[test]
fn metadata_terms_feed_match_score() {
	let tokens = lexical::tokenize("covenant grace");
	let query = lexical::query_terms(&tokens);
	let doc_terms = metadata::metadata_terms(&serde_json::json!({
		"tags": ["covenant", "grace"],
	}));

	assert_eq!(metadata::metadata_match_score(&query, &doc_terms), 1.0);
}

#[test]
fn reference_match_is_intersection() {
	let query = osis::expand_reference("John.1.1").expect("valid reference");
	let prologue = osis::expand_reference("John.1.1-18").expect("valid reference");
	let later = osis::expand_reference("John.2.1").expect("valid reference");

	assert!(osis::reference_matches(&query, &prologue));
	assert!(!osis::reference_matches(&query, &later));
	assert!(!osis::reference_matches(&query, &OsisRange::Empty));
}

#[test]
fn missing_tradition_excludes_when_constrained() {
	let filters = GuardrailFilters { traditions: vec!["Orthodox".to_string()], ..Default::default() };
	let with_tradition =
		DocumentAttributes { tradition: Some("orthodox".to_string()), ..Default::default() };

	assert!(guardrail::passes_filters(&with_tradition, &filters));
	assert!(!guardrail::passes_filters(&DocumentAttributes::default(), &filters));
}
