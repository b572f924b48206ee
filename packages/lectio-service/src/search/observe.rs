//! Per-call telemetry. Observers are write-only sinks and never affect the response.

use uuid::Uuid;

use lectio_domain::guardrail::GuardrailFilters;

use crate::search::{Backend, channel::ChannelKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
	Ok,
	TimedOut,
	Unavailable,
	Failed,
}
impl ChannelStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ok => "ok",
			Self::TimedOut => "timed_out",
			Self::Unavailable => "unavailable",
			Self::Failed => "failed",
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChannelReport {
	pub channel: ChannelKind,
	pub status: ChannelStatus,
	pub candidates: usize,
	pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchTelemetry {
	pub trace_id: Uuid,
	pub query: String,
	pub filters: GuardrailFilters,
	/// `None` when the call failed before any backend served it.
	pub backend: Option<Backend>,
	/// Channels that ran to an outcome. Empty when the call ended before channels were joined.
	pub channels: Vec<ChannelReport>,
	pub result_count: usize,
	pub latency_ms: u64,
	pub error: Option<String>,
}

pub trait SearchObserver
where
	Self: Send + Sync,
{
	fn record(&self, telemetry: &SearchTelemetry);
}

/// Emits one structured event per search: `info` on success, `warn` on failure.
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
	fn record(&self, telemetry: &SearchTelemetry) {
		let channels = telemetry
			.channels
			.iter()
			.map(|report| {
				format!(
					"{}={}:{}",
					report.channel.as_str(),
					report.status.as_str(),
					report.candidates
				)
			})
			.collect::<Vec<_>>()
			.join(",");

		let backend = telemetry.backend.map_or("none", Backend::as_str);

		match telemetry.error.as_deref() {
			None => tracing::info!(
				trace_id = %telemetry.trace_id,
				query = telemetry.query.as_str(),
				authors = ?telemetry.filters.authors,
				traditions = ?telemetry.filters.traditions,
				topic_domains = ?telemetry.filters.topic_domains,
				backend,
				channels = channels.as_str(),
				result_count = telemetry.result_count,
				latency_ms = telemetry.latency_ms,
				"Search completed."
			),
			Some(error) => tracing::warn!(
				trace_id = %telemetry.trace_id,
				query = telemetry.query.as_str(),
				authors = ?telemetry.filters.authors,
				traditions = ?telemetry.filters.traditions,
				topic_domains = ?telemetry.filters.topic_domains,
				backend,
				channels = channels.as_str(),
				latency_ms = telemetry.latency_ms,
				error,
				"Search failed."
			),
		}
	}
}
