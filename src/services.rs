mod constant;
mod fallible;
mod func;
mod lifetime;
mod providers;
mod service;
mod slot;
mod teardown;

pub use constant::*;
pub use fallible::*;
pub use func::*;
pub use lifetime::*;
pub use providers::*;
pub use service::*;
pub(crate) use slot::*;
pub use teardown::*;
