use crate::{Dependency, ServiceKey};

/// One parameter of a factory or injectable callable, as seen before the
/// callable is ever invoked.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Requirement {
    /// Zero-based index of the parameter.
    pub position: usize,

    /// Name given to the parameter, such as `arg0`.
    pub name: String,

    /// The key of the requested service, including any qualifier.
    pub key: ServiceKey,

    /// Whether the parameter accepts an absent value.
    pub optional: bool,
}

impl Requirement {
    pub(crate) fn new(position: usize, dependency: Dependency) -> Self {
        Requirement {
            position,
            name: format!("arg{position}"),
            key: dependency.key,
            optional: dependency.optional,
        }
    }
}

/// The inspectable parameter list of a callable. Implemented for the tuples
/// used as the dependency lists of service factories and injected callables,
/// so every callable that can be registered can also be inspected.
///
/// ```
/// use scoped_injector::{ServiceKey, Signature, Svc};
///
/// struct Database;
///
/// let requirements = <(Svc<Database>, Option<Svc<String>>)>::signature();
/// assert_eq!(ServiceKey::of::<Database>(), requirements[0].key);
/// assert_eq!("arg1", requirements[1].name);
/// assert!(requirements[1].optional);
/// ```
pub trait Signature {
    /// Lists the services requested by each parameter, in declaration order.
    /// Parameters satisfied by the injector itself, such as [`Injector`]
    /// or [`RequestInfo`], are omitted.
    ///
    /// [`Injector`]: crate::Injector
    /// [`RequestInfo`]: crate::RequestInfo
    fn signature() -> Vec<Requirement>;
}
