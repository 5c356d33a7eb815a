//! Async dependency injection with tiered scopes.
//!
//! Services are registered per *tier*, such as [`Tier::ROOT`] for the whole
//! application or [`Tier::REQUEST`] for a single request. While a flow of
//! execution is inside a scope of a tier, values from that tier's providers
//! can be requested, and they are released again when the scope exits.
//!
//! # Service lifetimes
//!
//! Lifetimes of services created by the [`Injector`] are controlled by the
//! provider used to construct them:
//!
//! - Scoped: A service is created the first time it is requested in an
//!   activation of its tier's scope, then reused until that scope exits.
//! - Transient: A service is created each time it is requested.
//! - Singleton: A service is created once for the process and released when
//!   the injector shuts down.
//!
//! Constants provided through [`constant`] behave like singletons whose value
//! already exists. Values that only make sense for one activation, such as
//! the inbound request itself, can be added to that scope with
//! [`Scope::add_value`].
//!
//! # Scopes and flows
//!
//! Each flow of execution has its own stack of entered scopes. A flow is
//! started with [`flow`], [`Injector::fork`] or implicitly by
//! [`Injector::contextual`]. Concurrent flows never see each other's scopes,
//! but every flow shares the singletons of the injector.
//!
//! Lookups start at the innermost scope and walk outwards, so a provider
//! registered for a more specific tier shadows one for an enclosing tier.
//!
//! # Example
//!
//! ```
//! use scoped_injector::{
//!     inject, Injector, IntoAsyncProvider, IntoProvider, Svc, Tier,
//! };
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! // Shared by every request.
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! // Created once per request.
//! struct RequestId(usize);
//!
//! async fn next_id(counter: Svc<Counter>) -> RequestId {
//!     RequestId(counter.0.fetch_add(1, Ordering::SeqCst))
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut builder = Injector::builder();
//!     builder.provide(Tier::ROOT, Counter::default.singleton());
//!     builder.provide(
//!         Tier::REQUEST,
//!         next_id
//!             .scoped_async()
//!             .with_teardown(|id: Svc<RequestId>| println!("done with {}", id.0)),
//!     );
//!     let injector = builder.build();
//!
//!     let handler = inject(|first: Svc<RequestId>, second: Svc<RequestId>| async move {
//!         assert_eq!(first.0, second.0);
//!         first.0
//!     });
//!
//!     let first = injector
//!         .contextual_all([Tier::ROOT, Tier::REQUEST], handler.call())
//!         .await
//!         .unwrap()
//!         .unwrap();
//!     let second = injector
//!         .contextual_all([Tier::ROOT, Tier::REQUEST], handler.call())
//!         .await
//!         .unwrap()
//!         .unwrap();
//!     assert_eq!(first + 1, second);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value,
    clippy::doc_markdown,
    clippy::needless_doctest_main
)]

mod builder;
mod config;
mod inject;
mod injector;
mod registry;
mod requests;
mod resolver;
mod scopes;
mod services;

pub use builder::*;
pub use config::*;
pub use inject::*;
pub use injector::*;
pub use registry::*;
pub use requests::*;
pub use scopes::*;
pub use services::*;

#[cfg(test)]
mod tests;
