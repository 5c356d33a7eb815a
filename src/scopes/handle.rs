use super::flow;
use crate::Scope;
use tracing::warn;

/// Proof that a scope was entered. Pass it to
/// [`Injector::exit_scope`](crate::Injector::exit_scope) to exit the scope.
///
/// Dropping a handle without exiting still removes the scope from its flow
/// and releases its values, but failures of release hooks are only logged.
/// If scopes entered after it are still active, the scope stays in place
/// until they have exited.
#[must_use = "the scope is released as soon as its handle is dropped"]
#[derive(Debug)]
pub struct ScopeHandle {
    scope: Scope,
    exited: bool,
}

impl ScopeHandle {
    pub(crate) fn new(scope: Scope) -> Self {
        ScopeHandle {
            scope,
            exited: false,
        }
    }

    /// The scope this handle controls.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn mark_exited(&mut self) {
        self.exited = true;
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if self.exited {
            return;
        }

        let scope = &self.scope;
        let released = flow::with_state(|state| state.release(scope))
            .unwrap_or_else(|| vec![scope.clone()]);
        if released.is_empty() {
            warn!(
                tier = %scope.tier(),
                scope = scope.id(),
                "scope handle dropped while inner scopes are active"
            );
        }

        for scope in released {
            if let Some(teardown) = scope.close() {
                warn!(
                    tier = %scope.tier(),
                    scope = scope.id(),
                    "scope handle dropped without exiting"
                );
                teardown.run_detached();
            }
        }
    }
}
