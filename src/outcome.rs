//! Validation outcomes delivered by the external prober.
//!
//! Delivery is in arrival order and at-least-once: duplicates and late
//! arrivals are expected, and nothing here assumes exactly-once semantics.

use serde::{Deserialize, Serialize};

use crate::endpoint::ServiceTag;

/// One asynchronous result from the prober.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// A candidate URL answered and is usable.
    ValidationSucceeded {
        url: String,
        service: ServiceTag,
        elapsed_ms: u64,
    },
    /// A candidate URL was probed and is unusable.
    ValidationFailed { url: String, service: ServiceTag },
    /// Batch-level summary of everything that validated.
    BatchSucceeded {
        urls: Vec<String>,
        services: Vec<ServiceTag>,
    },
    /// Batch-level summary of everything that failed.
    BatchFailed {
        urls: Vec<String>,
        services: Vec<ServiceTag>,
    },
    /// A candidate source produced additional URLs to probe.
    ExtraCandidatesDiscovered {
        /// The source that was fetched, when the prober reports it.
        source_url: Option<String>,
        urls: Vec<String>,
    },
    /// A candidate source could not be fetched. Telemetry only.
    SourceUpdateFailed { url: String },
    /// The prober is moving on to further candidates. Telemetry only.
    ValidationContinued,
    /// Authoritative end of validation, whatever the current phase.
    ValidationEnded { elapsed_ms: u64, cause: EndCause },
}

/// Why a resolution session reached its terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndCause {
    AllCandidatesFailed,
    TimedOut,
    Aborted,
}

impl EndCause {
    pub fn as_str(self) -> &'static str {
        match self {
            EndCause::AllCandidatesFailed => "all-candidates-failed",
            EndCause::TimedOut => "timed-out",
            EndCause::Aborted => "aborted",
        }
    }
}
