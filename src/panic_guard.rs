//! Process-wide panic guard
//!
//! Chunk uploads run on spawned tasks. A panic in one of them is caught by
//! the runtime and fails only that save, which the cache client already turns
//! into a warning. The hook installed here keeps the panic report itself at
//! warning level too, so the step is not annotated with an error for it.

use std::any::Any;
use tracing::warn;

const WARNING_PREFIX: &str = "[warning]";

/// Install the hook for the rest of the process lifetime
pub fn install() {
    std::panic::set_hook(Box::new(|info| {
        warn!("{}{}", WARNING_PREFIX, payload_message(info.payload()));
    }));
}

/// Best-effort text of a panic payload
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
