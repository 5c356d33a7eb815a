mod info;
mod qualified;
mod request;
mod signature;

pub use info::*;
pub use qualified::*;
pub use request::*;
pub use signature::*;
