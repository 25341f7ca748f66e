//! Process-wide context fallback
//!
//! Code in this workspace passes [`Context`] explicitly. Entry points that
//! cannot receive one (signal handlers, plugin callbacks) may look up a
//! context installed here instead.

use crate::context::Context;
use crate::error::{ActorError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

static INSTALLED: Lazy<RwLock<Option<Context>>> = Lazy::new(|| RwLock::new(None));

/// Install `context` as the process-wide fallback, returning the previous one
pub fn install(context: &Context) -> Option<Context> {
    debug!("Installing process-wide context");
    INSTALLED.write().replace(context.clone())
}

/// The installed context, if it is still running
pub fn context() -> Result<Context> {
    match INSTALLED.read().as_ref() {
        Some(context) if !context.is_stopped() => Ok(context.clone()),
        _ => Err(ActorError::ContextStopped),
    }
}

/// Remove the installed context
pub fn uninstall() -> Option<Context> {
    INSTALLED.write().take()
}
