use crate::Scope;
use std::{cell::RefCell, future::Future};

tokio::task_local! {
    static FLOW: RefCell<FlowState>;
}

/// The scopes entered by one flow of execution.
#[derive(Default)]
pub(crate) struct FlowState {
    /// The scope the flow was forked from. It is visible to the flow but can
    /// only be exited by the flow that entered it.
    pub base: Option<Scope>,

    /// Scopes entered by this flow, outermost first.
    pub stack: Vec<Scope>,

    /// Scopes whose handles are gone while scopes entered after them are
    /// still active. They stay on the stack until they are innermost.
    pub deferred: Vec<Scope>,
}

impl FlowState {
    pub fn innermost(&self) -> Option<&Scope> {
        self.stack.last().or(self.base.as_ref())
    }

    /// Takes a scope off the stack once nothing entered after it is still
    /// active. Returns the scopes that can be closed now, innermost first.
    pub fn release(&mut self, scope: &Scope) -> Vec<Scope> {
        match self.stack.iter().position(|entered| entered == scope) {
            None => vec![scope.clone()],
            Some(index) if index + 1 == self.stack.len() => {
                self.stack.pop();
                let mut released = vec![scope.clone()];
                released.extend(self.pop_deferred());
                released
            }
            Some(_) => {
                if !self.deferred.contains(scope) {
                    self.deferred.push(scope.clone());
                }
                Vec::new()
            }
        }
    }

    fn pop_deferred(&mut self) -> Vec<Scope> {
        let mut released = Vec::new();
        while let Some(innermost) = self.stack.last() {
            let Some(index) =
                self.deferred.iter().position(|scope| scope == innermost)
            else {
                break;
            };
            self.deferred.swap_remove(index);
            released.extend(self.stack.pop());
        }
        released
    }
}

/// Runs a future as a new flow of execution with its own, empty scope stack.
///
/// Scopes entered by one flow are invisible to every other flow, even on the
/// same thread. Use [`Injector::fork`](crate::Injector::fork) instead to start
/// a flow that sees the scopes of the current one.
pub fn flow<F: Future>(future: F) -> impl Future<Output = F::Output> {
    FLOW.scope(RefCell::new(FlowState::default()), future)
}

pub(crate) fn fork<F: Future>(
    base: Option<Scope>,
    future: F,
) -> impl Future<Output = F::Output> {
    let state = FlowState {
        base,
        ..FlowState::default()
    };
    FLOW.scope(RefCell::new(state), future)
}

/// Runs the future in the current flow, or in a new one if the task is not
/// running inside a flow yet.
pub(crate) async fn ensure<F: Future>(future: F) -> F::Output {
    if in_flow() {
        future.await
    } else {
        flow(future).await
    }
}

pub(crate) fn in_flow() -> bool {
    FLOW.try_with(|_| ()).is_ok()
}

/// Reads or updates the scope stack of the current flow. Returns `None`
/// outside of a flow.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut FlowState) -> R) -> Option<R> {
    FLOW.try_with(|state| f(&mut state.borrow_mut())).ok()
}

/// The innermost scope active in the current flow, if any.
#[must_use]
pub fn current_scope() -> Option<Scope> {
    with_state(|state| state.innermost().cloned()).flatten()
}
