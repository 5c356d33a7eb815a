mod flow;
mod handle;
mod scope;
mod tier;

pub(crate) use flow::{ensure, fork, with_state};
pub use flow::{current_scope, flow};
pub use handle::*;
pub use scope::*;
pub use tier::*;
