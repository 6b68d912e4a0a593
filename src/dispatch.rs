//! Decision dispatch to the external collaborators.
//!
//! Once the state machine settles, the dispatcher acts exactly once per
//! transition: engine initialization and UI refresh for a selected proxy,
//! nothing for a confirmed direct connection or an exhausted session.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::session::Transition;

/// Network engine collaborator. Fire-and-forget: the core never observes
/// the engine's startup result.
pub trait EngineControl: Send + Sync {
    fn initialize_engine(&self, url: &str);
}

/// UI collaborator, told when the engine is ready.
pub trait UiNotifier: Send + Sync {
    fn refresh(&self);
}

pub struct Dispatcher {
    engine: Arc<dyn EngineControl>,
    ui: Arc<dyn UiNotifier>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn EngineControl>, ui: Arc<dyn UiNotifier>) -> Self {
        Self { engine, ui }
    }

    pub fn dispatch(&self, transition: &Transition) {
        match transition {
            Transition::None => {}
            Transition::Selected(ep) => {
                debug!(service = ep.service().as_str(), "starting engine for selected url");
                self.engine.initialize_engine(ep.url());
                self.ui.refresh();
            }
            Transition::DirectConfirmed(_) => {
                debug!("direct connection works, engine start suppressed");
            }
            Transition::Exhausted(cause) => {
                // Fallback to an unproxied connection or a user-visible
                // error belongs to the caller, not this core.
                warn!(cause = cause.as_str(), "resolution ended without a usable endpoint");
            }
        }
    }
}
