#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod outcome;
pub mod registry;
pub mod resolver;
pub mod sanitize;
pub mod session;
pub mod telemetry;

pub use error::{ConfigError, Error, SessionError};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::config::ResolverConfig;
pub use crate::dispatch::{Dispatcher, EngineControl, UiNotifier};
pub use crate::endpoint::{DirectEndpoints, Endpoint, ServiceTag};
pub use crate::outcome::{EndCause, Outcome};
pub use crate::registry::CandidateRegistry;
pub use crate::resolver::{
    DirectMode, OutcomeSender, ProbeRequest, Resolver, outcome_channel, run_resolver_loop,
};
pub use crate::sanitize::sanitize_url;
pub use crate::session::{SelectionState, Session, Transition};
pub use crate::telemetry::{EventSink, FieldValue, RecordingSink, TelemetryEvent, TracingSink};
