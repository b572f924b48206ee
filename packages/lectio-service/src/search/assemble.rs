use lectio_domain::lexical;
use lectio_storage::models::DocumentRecord;

use crate::search::{Backend, DocumentContext, SearchExplain, SearchItem, fusion::RankedCandidate};

#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
	pub snippet_max_chars: usize,
	pub max_highlights: usize,
	pub reference_bonus: f32,
	pub backend: Backend,
}

pub fn build_result(
	ranked: &RankedCandidate,
	document: &DocumentRecord,
	query_tokens: &[String],
	options: &AssembleOptions,
) -> SearchItem {
	let candidate = &ranked.candidate;
	let text = candidate.passage.text.as_str();
	let snippet = lexical::snippet(text, query_tokens, options.snippet_max_chars);
	let fragments = lexical::highlight_fragments(text, query_tokens, options.snippet_max_chars);
	let highlights = lexical::build_highlights(&fragments, query_tokens, options.max_highlights);

	SearchItem {
		passage_id: candidate.passage.passage_id,
		document_id: candidate.passage.document_id,
		document_title: document.title.clone(),
		snippet,
		highlights,
		structured_reference: candidate.passage.osis_ref.clone(),
		score: ranked.total,
		document_rank: ranked.document_rank,
		backend: options.backend,
		document: DocumentContext {
			authors: document.attributes.authors.clone(),
			tradition: document.attributes.tradition.clone(),
			topic_domains: document.attributes.topic_domains.clone(),
			source_url: document.source_url.clone(),
		},
		explain: SearchExplain {
			lexical: candidate.lexical,
			vector: candidate.vector,
			metadata: candidate.metadata,
			reference_distance: candidate.reference_distance,
			reference_bonus: if candidate.reference_match { options.reference_bonus } else { 0.0 },
		},
	}
}
