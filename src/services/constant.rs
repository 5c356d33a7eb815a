use crate::{Lifetime, Service, TypedProvider};

/// Create a provider from a constant value. The value exists for the whole
/// process: every request receives it, including requests made outside of
/// any scope when the constant is registered for [`Tier::ROOT`](crate::Tier::ROOT).
///
/// A release hook attached to a constant runs once, during
/// [`Injector::shutdown`](crate::Injector::shutdown), and only if the
/// constant was requested at least once.
///
/// ```
/// use scoped_injector::{constant, Injector, Svc, Tier};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut builder = Injector::builder();
///     builder.registry_for(Tier::ROOT).provide(constant(8i32));
///
///     let injector = builder.build();
///     let value: Svc<i32> = injector.get().await.unwrap();
///     assert_eq!(8, *value);
/// }
/// ```
#[must_use]
pub fn constant<R: Service>(value: R) -> TypedProvider<R> {
    TypedProvider::from_value(value, Lifetime::Singleton)
}
