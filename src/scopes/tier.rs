use derive_more::Display;
use std::borrow::Cow;

/// Identifies a scope tier, such as the application root or a single inbound
/// request. Each tier owns a [`RegistryChain`](crate::RegistryChain), and any
/// number of [`Scope`](crate::Scope) activations of it may be alive at once.
///
/// ```
/// use scoped_injector::Tier;
///
/// let command = Tier::new("command");
/// assert_eq!("command", command.name());
/// assert_eq!("request", Tier::REQUEST.to_string());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct Tier(Cow<'static, str>);

impl Tier {
    /// The outermost tier. Singletons and constants registered here are
    /// visible from every scope, and outside of any scope. Scoped and
    /// transient providers registered here need an active root scope.
    pub const ROOT: Tier = Tier(Cow::Borrowed("root"));

    /// A tier for per-request scopes opened by framework adapters.
    pub const REQUEST: Tier = Tier(Cow::Borrowed("request"));

    /// Creates a tier with a custom label.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Tier(name.into())
    }

    /// The label of this tier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::ROOT
    }
}

impl From<&'static str> for Tier {
    fn from(name: &'static str) -> Self {
        Tier::new(name)
    }
}
