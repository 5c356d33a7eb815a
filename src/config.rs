use std::env;

/// Runtime switches for an [`Injector`](crate::Injector).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InjectorConfig {
    /// When `false`, every request fails with
    /// [`InjectError::Disabled`](crate::InjectError::Disabled). Scopes can
    /// still be entered and exited.
    pub enabled: bool,
}

impl InjectorConfig {
    /// Environment variable which turns injection off when set to `true`.
    pub const DISABLED_VAR: &'static str = "SCOPED_INJECTOR_DISABLED";

    /// Reads the configuration from the process environment.
    ///
    /// ```
    /// use scoped_injector::InjectorConfig;
    ///
    /// let config = InjectorConfig::from_env();
    /// # let _ = config;
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through a custom variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let disabled = lookup(Self::DISABLED_VAR)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
        InjectorConfig { enabled: !disabled }
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        InjectorConfig { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_only_by_true() {
        let lookup = |value: &'static str| {
            move |name: &str| {
                (name == InjectorConfig::DISABLED_VAR).then(|| value.to_owned())
            }
        };

        assert!(!InjectorConfig::from_lookup(lookup("true")).enabled);
        assert!(!InjectorConfig::from_lookup(lookup(" TRUE ")).enabled);
        assert!(InjectorConfig::from_lookup(lookup("1")).enabled);
        assert!(InjectorConfig::from_lookup(|_| None).enabled);
    }
}
