//! Tools that ship with the crate.

mod clock;
mod echo;

pub use clock::CurrentTimeTool;
pub use echo::echo_tool;

use crate::tools::registry::ToolRegistry;
use std::sync::Arc;

/// Installs every builtin tool into the registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(CurrentTimeTool));
    registry.register(Arc::new(echo_tool()));
}
