use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::hook::{EventHook, HookError};
use crate::message::AnyMessage;

/// The set of active event hooks.
///
/// Notifications iterate a snapshot taken under the read lock, so hooks can be
/// registered or removed while a notification is running.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Arc<RwLock<Vec<Arc<dyn EventHook>>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook. Registering the same `Arc` twice keeps one entry.
    pub fn register(&self, hook: Arc<dyn EventHook>) {
        let mut hooks = self.hooks.write();
        if !hooks.iter().any(|h| same_hook(h, &hook)) {
            hooks.push(hook);
        }
    }

    /// Remove a hook by identity. Returns whether it was registered.
    pub fn unregister(&self, hook: &Arc<dyn EventHook>) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|h| !same_hook(h, hook));
        hooks.len() != before
    }

    pub fn clear(&self) {
        self.hooks.write().clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    pub fn notify_sent(&self, message: &dyn AnyMessage) {
        for hook in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook.message_sent(message)));
            report("message_sent", message, outcome);
        }
    }

    pub fn notify_received(&self, message: &dyn AnyMessage, endpoint: &str) {
        for hook in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook.message_received(message, endpoint)));
            report("message_received", message, outcome);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventHook>> {
        self.hooks.read().clone()
    }
}

fn same_hook(a: &Arc<dyn EventHook>, b: &Arc<dyn EventHook>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn report(
    event: &'static str,
    message: &dyn AnyMessage,
    outcome: Result<Result<(), HookError>, Box<dyn Any + Send>>,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(
            hook_event = event,
            message_type = message.type_name(),
            correlation_id = %message.correlation(),
            error = %err,
            "event hook failed"
        ),
        Err(panic) => warn!(
            hook_event = event,
            message_type = message.type_name(),
            correlation_id = %message.correlation(),
            panic = panic_message(panic.as_ref()),
            "event hook panicked"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
