//! Session orchestration and the outcome event loop.
//!
//! The resolver owns all per-session state and is THE serialization point:
//! outcomes are absorbed one at a time, either by calling
//! [`Resolver::handle_outcome`] directly or by parking the resolver on a
//! dedicated thread with [`run_resolver_loop`] fed from the channel half
//! handed to the prober.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::dispatch::Dispatcher;
use crate::endpoint::DirectEndpoints;
use crate::error::SessionError;
use crate::outcome::Outcome;
use crate::session::{SelectionState, Session, Transition};
use crate::telemetry::EventSink;

/// Process-scoped "direct connection works" flag.
///
/// Set when a session confirms the direct endpoint; while set, no new
/// session may start. Cleared only at an explicit boundary (the host
/// application's restart equivalent) via [`DirectMode::reset`].
#[derive(Clone, Debug, Default)]
pub struct DirectMode(Arc<AtomicBool>);

impl DirectMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything the external prober needs for one validation run. The cert
/// blob and source knobs are passed through opaquely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub candidates: Vec<String>,
    pub direct_urls: Vec<String>,
    pub cert: Option<String>,
    pub url_sources: Vec<String>,
    pub url_interval: u32,
    pub url_start: u32,
    pub url_end: u32,
}

/// Sending half of the outcome channel; the subscription handle given to
/// the prober. Dropping every handle ends the resolver loop.
#[derive(Clone)]
pub struct OutcomeSender(Sender<Outcome>);

impl OutcomeSender {
    /// Deliver one outcome. Returns false when the resolver is gone.
    pub fn send(&self, outcome: Outcome) -> bool {
        self.0.send(outcome).is_ok()
    }
}

pub fn outcome_channel() -> (OutcomeSender, Receiver<Outcome>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    (OutcomeSender(tx), rx)
}

pub struct Resolver {
    config: ResolverConfig,
    direct: DirectEndpoints,
    direct_mode: DirectMode,
    session: Option<Session>,
    dispatcher: Dispatcher,
    sink: Arc<dyn EventSink>,
}

impl Resolver {
    pub fn new(config: ResolverConfig, dispatcher: Dispatcher, sink: Arc<dyn EventSink>) -> Self {
        Self::with_direct_mode(config, dispatcher, sink, DirectMode::new())
    }

    /// Share an existing process-wide flag, e.g. across resolver rebuilds.
    pub fn with_direct_mode(
        config: ResolverConfig,
        dispatcher: Dispatcher,
        sink: Arc<dyn EventSink>,
        direct_mode: DirectMode,
    ) -> Self {
        let direct = DirectEndpoints::new(config.direct_urls.iter().cloned());
        Self {
            config,
            direct,
            direct_mode,
            session: None,
            dispatcher,
            sink,
        }
    }

    pub fn direct_mode(&self) -> DirectMode {
        self.direct_mode.clone()
    }

    pub fn state(&self) -> Option<&SelectionState> {
        self.session.as_ref().map(Session::state)
    }

    /// Begin a resolution attempt.
    ///
    /// Guarded against re-entry: a session still waiting for outcomes, or a
    /// previously confirmed direct connection, rejects the start. On success
    /// the previous session's state is discarded and the returned request is
    /// handed to the prober.
    pub fn start_session(&mut self) -> Result<ProbeRequest, SessionError> {
        if self.direct_mode.is_set() {
            debug!("direct connection previously worked, not starting resolution");
            return Err(SessionError::DirectModeActive);
        }
        if let Some(session) = &self.session
            && session.state().is_waiting()
        {
            debug!(session = %session.id(), "already processing urls, not starting again");
            return Err(SessionError::AlreadyWaiting);
        }

        let session = Session::new(self.config.candidates.iter().cloned());
        debug!(
            session = %session.id(),
            candidates = session.registry().total(),
            "starting resolution session"
        );
        self.session = Some(session);

        Ok(ProbeRequest {
            candidates: self.config.candidates.clone(),
            direct_urls: self.config.direct_urls.clone(),
            cert: self.config.cert.clone(),
            url_sources: self.config.url_sources.clone(),
            url_interval: self.config.url_interval,
            url_start: self.config.url_start,
            url_end: self.config.url_end,
        })
    }

    /// Absorb one outcome and act on the resulting transition.
    pub fn handle_outcome(&mut self, outcome: Outcome) {
        let Some(session) = self.session.as_mut() else {
            warn!("outcome received with no active session, dropped");
            return;
        };

        let transition = session.handle_outcome(outcome, &self.direct, self.sink.as_ref());
        if let Transition::DirectConfirmed(_) = &transition {
            self.direct_mode.set();
        }
        self.dispatcher.dispatch(&transition);
    }
}

/// Drive a resolver from a channel of outcomes until every sender is gone.
///
/// This is the single-owner event loop: it serializes all mutation of the
/// session and registry without any locking.
pub fn run_resolver_loop(mut resolver: Resolver, rx: Receiver<Outcome>) -> Resolver {
    for outcome in rx.iter() {
        resolver.handle_outcome(outcome);
    }
    debug!("outcome channel disconnected, resolver loop ending");
    resolver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{EngineControl, UiNotifier};
    use crate::telemetry::RecordingSink;

    struct NullEngine;
    impl EngineControl for NullEngine {
        fn initialize_engine(&self, _url: &str) {}
    }

    struct NullUi;
    impl UiNotifier for NullUi {
        fn refresh(&self) {}
    }

    fn resolver(candidates: &[&str]) -> Resolver {
        let config = ResolverConfig {
            candidates: candidates.iter().map(|u| u.to_string()).collect(),
            ..ResolverConfig::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(NullEngine), Arc::new(NullUi));
        Resolver::new(config, dispatcher, Arc::new(RecordingSink::new()))
    }

    #[test]
    fn start_is_rejected_while_waiting() {
        let mut resolver = resolver(&["https://a.example/"]);
        let request = resolver.start_session().expect("first start");
        assert_eq!(request.candidates, vec!["https://a.example/".to_string()]);
        assert_eq!(resolver.start_session(), Err(SessionError::AlreadyWaiting));
    }

    #[test]
    fn start_is_allowed_after_terminal_state() {
        let mut resolver = resolver(&["https://a.example/"]);
        resolver.start_session().expect("first start");
        resolver.handle_outcome(Outcome::ValidationFailed {
            url: "https://a.example/".to_string(),
            service: crate::endpoint::ServiceTag::Https,
        });
        assert!(!resolver.state().expect("session").is_waiting());
        resolver.start_session().expect("restart after exhaustion");
    }

    #[test]
    fn direct_mode_blocks_new_sessions_until_reset() {
        let mut resolver = resolver(&["https://a.example/"]);
        resolver.start_session().expect("start");
        resolver.handle_outcome(Outcome::ValidationSucceeded {
            url: crate::config::DEFAULT_DIRECT_URL.to_string(),
            service: crate::endpoint::ServiceTag::Direct,
            elapsed_ms: 300,
        });

        let direct_mode = resolver.direct_mode();
        assert!(direct_mode.is_set());
        assert_eq!(resolver.start_session(), Err(SessionError::DirectModeActive));

        direct_mode.reset();
        resolver.start_session().expect("start after reset");
    }

    #[test]
    fn outcomes_without_a_session_are_dropped() {
        let mut resolver = resolver(&["https://a.example/"]);
        resolver.handle_outcome(Outcome::SourceUpdateFailed {
            url: "https://source.example/42/".to_string(),
        });
        assert!(resolver.state().is_none());
    }
}
