//! Selection state machine for one resolution session.
//!
//! A session starts `Waiting`, consumes prober outcomes in arrival order,
//! and settles on exactly one winning endpoint or a terminal failure. The
//! transition function is synchronous and non-reentrant; the resolver owns
//! the session and serializes all access to it.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::endpoint::{DirectEndpoints, Endpoint, ServiceTag};
use crate::outcome::{EndCause, Outcome};
use crate::registry::CandidateRegistry;
use crate::sanitize::sanitize_url;
use crate::telemetry::{EventSink, TelemetryEvent, clamp_validation_seconds, fields, tags};

/// Analytics parameter limit: batch URL values are truncated to this many
/// characters before joining.
const BATCH_URL_TRUNCATE: usize = 30;

/// Phase of a resolution session.
///
/// Transitions are monotonic: `Waiting` moves to `Resolved` or `Exhausted`
/// and both terminal phases are sticky, with one exception: a
/// `ValidationEnded` outcome is an authoritative external termination and
/// overwrites any phase with `Exhausted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionState {
    Waiting,
    Resolved(Endpoint),
    Exhausted(EndCause),
}

impl SelectionState {
    pub fn is_waiting(&self) -> bool {
        matches!(self, SelectionState::Waiting)
    }

    pub fn winning_endpoint(&self) -> Option<&Endpoint> {
        match self {
            SelectionState::Resolved(ep) => Some(ep),
            _ => None,
        }
    }
}

/// What the caller must do after one outcome was absorbed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Nothing beyond the telemetry already emitted.
    None,
    /// A proxy endpoint won: start the engine and refresh the UI.
    Selected(Endpoint),
    /// The direct endpoint won: no engine, suppress future sessions.
    DirectConfirmed(Endpoint),
    /// No endpoint is usable; the caller decides the fallback.
    Exhausted(EndCause),
}

/// One resolution attempt, from submit to terminal decision.
pub struct Session {
    id: Uuid,
    state: SelectionState,
    registry: CandidateRegistry,
    elapsed_ms: u64,
}

impl Session {
    pub fn new(candidates: impl IntoIterator<Item = String>) -> Self {
        let mut registry = CandidateRegistry::new();
        registry.set_initial(candidates);
        Self {
            id: Uuid::new_v4(),
            state: SelectionState::Waiting,
            registry,
            elapsed_ms: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Absorb one prober outcome.
    ///
    /// Total over malformed payloads: empty URLs and empty batches are
    /// logged and dropped without a state change.
    pub fn handle_outcome(
        &mut self,
        outcome: Outcome,
        direct: &DirectEndpoints,
        sink: &dyn EventSink,
    ) -> Transition {
        match outcome {
            Outcome::ValidationSucceeded {
                url,
                service,
                elapsed_ms,
            } => self.on_succeeded(url, service, elapsed_ms, direct, sink),
            Outcome::ValidationFailed { url, service } => self.on_failed(url, service, sink),
            Outcome::BatchSucceeded { urls, services } => {
                self.on_batch(urls, services, true, direct, sink)
            }
            Outcome::BatchFailed { urls, services } => {
                self.on_batch(urls, services, false, direct, sink)
            }
            Outcome::ExtraCandidatesDiscovered { source_url, urls } => {
                self.on_extra(source_url, urls, sink)
            }
            Outcome::SourceUpdateFailed { url } => self.on_update_failed(url, sink),
            Outcome::ValidationContinued => self.on_continued(sink),
            Outcome::ValidationEnded { elapsed_ms, cause } => {
                self.on_ended(elapsed_ms, cause, sink)
            }
        }
    }

    fn on_succeeded(
        &mut self,
        url: String,
        service: ServiceTag,
        elapsed_ms: u64,
        direct: &DirectEndpoints,
        sink: &dyn EventSink,
    ) -> Transition {
        if url.is_empty() {
            warn!(session = %self.id, "received a valid url that was empty");
            return Transition::None;
        }

        let sanitized = sanitize_url(&url, service);

        if !self.state.is_waiting() {
            // Late or duplicate success: informational only.
            debug!(session = %self.id, service = service.as_str(), "already decided, ignore valid url");
            sink.log_event(
                TelemetryEvent::new(tags::VALID_URL)
                    .with_str(fields::VALID_URL_VALUE, sanitized)
                    .with_str(fields::VALID_URL_SERVICE, service.as_str()),
            );
            return Transition::None;
        }

        self.elapsed_ms = elapsed_ms;
        let ep = Endpoint::new(url, service);

        let transition = if direct.contains(ep.url()) {
            debug!(session = %self.id, "direct url validated, no engine needed");
            sink.log_event(
                TelemetryEvent::new(tags::DIRECT_URL)
                    .with_str(fields::DIRECT_URL_VALUE, sanitized)
                    .with_str(fields::DIRECT_URL_SERVICE, service.as_str()),
            );
            Transition::DirectConfirmed(ep.clone())
        } else {
            debug!(session = %self.id, service = service.as_str(), "selected a valid url");
            sink.log_event(
                TelemetryEvent::new(tags::SELECTED_URL)
                    .with_str(fields::SELECTED_URL_VALUE, sanitized)
                    .with_str(fields::SELECTED_URL_SERVICE, service.as_str()),
            );
            Transition::Selected(ep.clone())
        };

        self.emit_validation_time(elapsed_ms, sink);
        self.state = SelectionState::Resolved(ep);
        transition
    }

    fn on_failed(&mut self, url: String, service: ServiceTag, sink: &dyn EventSink) -> Transition {
        if url.is_empty() {
            warn!(session = %self.id, "received an invalid url that was empty");
            return Transition::None;
        }

        sink.log_event(
            TelemetryEvent::new(tags::INVALID_URL)
                .with_str(fields::INVALID_URL_VALUE, sanitize_url(&url, service))
                .with_str(fields::INVALID_URL_SERVICE, service.as_str()),
        );

        let all_failed = self.registry.mark_failed(&url);
        if all_failed && self.state.is_waiting() {
            warn!(session = %self.id, "no urls left to try");
            self.state = SelectionState::Exhausted(EndCause::AllCandidatesFailed);
            return Transition::Exhausted(EndCause::AllCandidatesFailed);
        }

        debug!(
            session = %self.id,
            failed = self.registry.failed_count(),
            total = self.registry.total(),
            "still trying urls"
        );
        Transition::None
    }

    fn on_batch(
        &mut self,
        urls: Vec<String>,
        services: Vec<ServiceTag>,
        valid: bool,
        direct: &DirectEndpoints,
        sink: &dyn EventSink,
    ) -> Transition {
        if urls.is_empty() || services.is_empty() {
            warn!(session = %self.id, valid, "received a batch outcome with no urls or services");
            return Transition::None;
        }

        // Direct URLs are a connectivity baseline, not proxies; keep them
        // out of the batch summary.
        let joined_urls = urls
            .iter()
            .filter(|url| !direct.contains(url))
            .map(|url| url.chars().take(BATCH_URL_TRUNCATE).collect::<String>())
            .collect::<Vec<_>>()
            .join(",");
        let joined_services = services
            .iter()
            .map(|service| service.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let event = if valid {
            TelemetryEvent::new(tags::VALID_BATCH)
                .with_str(fields::VALID_BATCH_URLS, joined_urls)
                .with_str(fields::VALID_BATCH_SERVICES, joined_services)
        } else {
            TelemetryEvent::new(tags::INVALID_BATCH)
                .with_str(fields::INVALID_BATCH_URLS, joined_urls)
                .with_str(fields::INVALID_BATCH_SERVICES, joined_services)
        };
        sink.log_event(event);
        Transition::None
    }

    fn on_extra(
        &mut self,
        source_url: Option<String>,
        urls: Vec<String>,
        sink: &dyn EventSink,
    ) -> Transition {
        if urls.is_empty() {
            warn!(session = %self.id, "received a candidate update with no urls");
            return Transition::None;
        }

        let added = self.registry.add_extra(&urls);
        debug!(
            session = %self.id,
            received = urls.len(),
            added,
            "absorbed additional candidate urls"
        );
        let mut event = TelemetryEvent::new(tags::UPDATE_SUCCEEDED)
            .with_int(fields::UPDATE_SUCCEEDED_COUNT, added as i64);
        if let Some(source_url) = source_url.filter(|url| !url.is_empty()) {
            event = event.with_str(
                fields::UPDATE_SUCCEEDED_URL,
                sanitize_url(&source_url, ServiceTag::Update),
            );
        }
        sink.log_event(event);
        Transition::None
    }

    fn on_update_failed(&mut self, url: String, sink: &dyn EventSink) -> Transition {
        if url.is_empty() {
            warn!(session = %self.id, "received a source update failure with no url");
            return Transition::None;
        }

        sink.log_event(
            TelemetryEvent::new(tags::UPDATE_FAILED)
                .with_str(fields::UPDATE_FAILED_URL, sanitize_url(&url, ServiceTag::Update)),
        );
        Transition::None
    }

    fn on_continued(&mut self, sink: &dyn EventSink) -> Transition {
        debug!(session = %self.id, "validation continuing with further candidates");
        sink.log_event(TelemetryEvent::new(tags::CONTINUE_VALIDATION));
        Transition::None
    }

    fn on_ended(&mut self, elapsed_ms: u64, cause: EndCause, sink: &dyn EventSink) -> Transition {
        self.elapsed_ms = elapsed_ms;
        self.emit_validation_time(elapsed_ms, sink);
        sink.log_event(
            TelemetryEvent::new(tags::VALIDATION_ENDED)
                .with_str(fields::VALIDATION_CAUSE, cause.as_str()),
        );

        // External termination is authoritative over any phase.
        debug!(session = %self.id, cause = cause.as_str(), "validation ended");
        self.state = SelectionState::Exhausted(cause);
        Transition::Exhausted(cause)
    }

    fn emit_validation_time(&self, elapsed_ms: u64, sink: &dyn EventSink) {
        if elapsed_ms == 0 {
            return;
        }
        sink.log_event(
            TelemetryEvent::new(tags::VALIDATION_TIME)
                .with_int(fields::VALIDATION_SECONDS, clamp_validation_seconds(elapsed_ms)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FieldValue, RecordingSink};

    fn session(candidates: &[&str]) -> Session {
        Session::new(candidates.iter().map(|u| u.to_string()))
    }

    fn no_direct() -> DirectEndpoints {
        DirectEndpoints::default()
    }

    fn succeeded(url: &str, elapsed_ms: u64) -> Outcome {
        Outcome::ValidationSucceeded {
            url: url.to_string(),
            service: ServiceTag::Https,
            elapsed_ms,
        }
    }

    fn failed(url: &str) -> Outcome {
        Outcome::ValidationFailed {
            url: url.to_string(),
            service: ServiceTag::Https,
        }
    }

    #[test]
    fn first_success_resolves_and_sticks() {
        let mut session = session(&["https://a.example/", "https://b.example/"]);
        let sink = RecordingSink::new();

        let transition = session.handle_outcome(succeeded("https://a.example/", 500), &no_direct(), &sink);
        let Transition::Selected(ep) = transition else {
            panic!("expected selection, got {:?}", transition);
        };
        assert_eq!(ep.url(), "https://a.example/");
        assert_eq!(sink.tags(), vec![tags::SELECTED_URL, tags::VALIDATION_TIME]);

        // A later success must not change the winner.
        let transition = session.handle_outcome(succeeded("https://b.example/", 200), &no_direct(), &sink);
        assert_eq!(transition, Transition::None);
        assert_eq!(
            session.state().winning_endpoint().map(Endpoint::url),
            Some("https://a.example/")
        );
        assert_eq!(sink.events().last().map(|e| e.tag), Some(tags::VALID_URL));
    }

    #[test]
    fn exhaustion_fires_exactly_once_despite_duplicates() {
        let mut session = session(&["https://a.example/", "https://b.example/"]);
        let sink = RecordingSink::new();

        assert_eq!(session.handle_outcome(failed("https://a.example/"), &no_direct(), &sink), Transition::None);
        assert_eq!(session.handle_outcome(failed("https://a.example/"), &no_direct(), &sink), Transition::None);
        assert_eq!(
            session.handle_outcome(failed("https://b.example/"), &no_direct(), &sink),
            Transition::Exhausted(EndCause::AllCandidatesFailed)
        );
        // Further duplicates stay informational.
        assert_eq!(session.handle_outcome(failed("https://b.example/"), &no_direct(), &sink), Transition::None);
        assert_eq!(session.registry().failed_count(), 2);
    }

    #[test]
    fn empty_urls_are_dropped_without_transition() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        assert_eq!(session.handle_outcome(succeeded("", 100), &no_direct(), &sink), Transition::None);
        assert_eq!(session.handle_outcome(failed(""), &no_direct(), &sink), Transition::None);
        assert!(session.state().is_waiting());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn direct_url_confirms_without_selection_event() {
        let direct = DirectEndpoints::new(["https://www.wikipedia.org/".to_string()]);
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        let transition = session.handle_outcome(
            Outcome::ValidationSucceeded {
                url: "https://www.wikipedia.org/".to_string(),
                service: ServiceTag::Direct,
                elapsed_ms: 1200,
            },
            &direct,
            &sink,
        );
        assert!(matches!(transition, Transition::DirectConfirmed(_)));
        assert_eq!(sink.tags(), vec![tags::DIRECT_URL, tags::VALIDATION_TIME]);
    }

    #[test]
    fn validation_ended_overrides_resolved() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        session.handle_outcome(succeeded("https://a.example/", 2000), &no_direct(), &sink);
        let transition = session.handle_outcome(
            Outcome::ValidationEnded {
                elapsed_ms: 9_500,
                cause: EndCause::TimedOut,
            },
            &no_direct(),
            &sink,
        );
        assert_eq!(transition, Transition::Exhausted(EndCause::TimedOut));
        assert_eq!(session.state(), &SelectionState::Exhausted(EndCause::TimedOut));
        assert_eq!(session.elapsed_ms(), 9_500);

        let events = sink.events();
        let time_event = &events[events.len() - 2];
        assert_eq!(time_event.tag, tags::VALIDATION_TIME);
        assert_eq!(
            time_event.field(fields::VALIDATION_SECONDS).and_then(FieldValue::as_int),
            Some(9)
        );
        assert_eq!(events.last().map(|e| e.tag), Some(tags::VALIDATION_ENDED));
    }

    #[test]
    fn validation_ended_with_zero_elapsed_skips_time_event() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        session.handle_outcome(
            Outcome::ValidationEnded {
                elapsed_ms: 0,
                cause: EndCause::Aborted,
            },
            &no_direct(),
            &sink,
        );
        assert_eq!(sink.tags(), vec![tags::VALIDATION_ENDED]);
    }

    #[test]
    fn batch_summary_filters_direct_and_truncates() {
        let direct = DirectEndpoints::new(["https://www.wikipedia.org/".to_string()]);
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        let long = format!("https://very-long-proxy-host.example/{}", "x".repeat(40));
        session.handle_outcome(
            Outcome::BatchSucceeded {
                urls: vec!["https://www.wikipedia.org/".to_string(), long.clone()],
                services: vec![ServiceTag::Direct, ServiceTag::Envoy],
            },
            &direct,
            &sink,
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let urls = events[0]
            .field(fields::VALID_BATCH_URLS)
            .and_then(FieldValue::as_str)
            .expect("batch urls field");
        assert_eq!(urls, &long[..30]);
        assert_eq!(
            events[0].field(fields::VALID_BATCH_SERVICES).and_then(FieldValue::as_str),
            Some("direct,envoy")
        );
    }

    #[test]
    fn empty_batch_is_dropped() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        session.handle_outcome(
            Outcome::BatchFailed {
                urls: Vec::new(),
                services: Vec::new(),
            },
            &no_direct(),
            &sink,
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn extra_candidates_extend_the_working_set() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        session.handle_outcome(failed("https://a.example/"), &no_direct(), &sink);
        assert!(!session.state().is_waiting());

        // New session semantics are exercised at the resolver level; within a
        // session, extras arriving before exhaustion keep it alive.
        let mut session = Session::new(["https://a.example/".to_string()]);
        session.handle_outcome(
            Outcome::ExtraCandidatesDiscovered {
                source_url: None,
                urls: vec!["https://b.example/".to_string(), "https://a.example/".to_string()],
            },
            &no_direct(),
            &sink,
        );
        assert_eq!(session.registry().total(), 2);
        session.handle_outcome(failed("https://a.example/"), &no_direct(), &sink);
        assert!(session.state().is_waiting());
    }

    #[test]
    fn extra_candidates_report_the_sanitized_source() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        session.handle_outcome(
            Outcome::ExtraCandidatesDiscovered {
                source_url: Some("https://source.example/777/current".to_string()),
                urls: vec!["https://b.example/".to_string()],
            },
            &no_direct(),
            &sink,
        );

        let events = sink.events();
        assert_eq!(events[0].tag, tags::UPDATE_SUCCEEDED);
        assert_eq!(
            events[0].field(fields::UPDATE_SUCCEEDED_URL).and_then(FieldValue::as_str),
            Some("777")
        );
        assert_eq!(
            events[0].field(fields::UPDATE_SUCCEEDED_COUNT).and_then(FieldValue::as_int),
            Some(1)
        );
    }

    #[test]
    fn continuation_is_telemetry_only() {
        let mut session = session(&["https://a.example/"]);
        let sink = RecordingSink::new();

        let transition = session.handle_outcome(Outcome::ValidationContinued, &no_direct(), &sink);
        assert_eq!(transition, Transition::None);
        assert!(session.state().is_waiting());
        assert_eq!(sink.tags(), vec![tags::CONTINUE_VALIDATION]);

        // Continuation after a decision stays harmless.
        session.handle_outcome(failed("https://a.example/"), &no_direct(), &sink);
        let transition = session.handle_outcome(Outcome::ValidationContinued, &no_direct(), &sink);
        assert_eq!(transition, Transition::None);
        assert_eq!(
            session.state(),
            &SelectionState::Exhausted(EndCause::AllCandidatesFailed)
        );
    }
}
