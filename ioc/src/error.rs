use thiserror::Error;

/// The flat taxonomy of resolution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  UnableToResolveService,
  UnableToResolveDependency,
  FactoryObjectIsNull,
  ServiceNotAssignableFromFactoryMethod,
  RecursiveDependencyDetected,
  DuplicateRegistration,
  AmbiguousService,
  NoMatchingScope,
  NullFactoryResult,
  ScopedDependencyInSingleton,
  ContainerDisposed,
}

/// The error type for registration and resolution.
///
/// Every variant carries enough context to tell which service, parameter or
/// scope was involved. Use [`Error::kind`] to branch on the failure class.
#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("Unable to resolve service {service}: no registration found")]
  UnableToResolveService { service: String },

  #[error(
    "Unable to resolve dependency '{parameter}' of type {parameter_type} \
     while constructing {service}: {reason}"
  )]
  UnableToResolveDependency {
    parameter: String,
    parameter_type: &'static str,
    service: String,
    reason: String,
  },

  #[error("Factory object of type {owner} for {service} resolved to nothing; cannot invoke {method}")]
  FactoryObjectIsNull {
    owner: String,
    service: String,
    method: &'static str,
  },

  #[error("Service {service} is not assignable from {implementation} returned by {method}")]
  ServiceNotAssignableFromFactoryMethod {
    service: &'static str,
    implementation: &'static str,
    method: &'static str,
  },

  #[error("Recursive dependency detected: {chain}")]
  RecursiveDependencyDetected { chain: String },

  #[error("Service {service} is already registered and duplicate registrations are rejected")]
  DuplicateRegistration { service: String },

  #[error("Unable to select a default for {service}: {count} keyed registrations and no default")]
  AmbiguousService { service: String, count: usize },

  #[error("No open scope named '{scope}' is available to hold {service}")]
  NoMatchingScope { scope: String, service: String },

  #[error("A nullable factory produced no instance for required service {service}")]
  NullFactoryResult { service: String },

  #[error("Singleton {service} depends on a service held by scope '{scope}' and would outlive it")]
  ScopedDependencyInSingleton { service: String, scope: String },

  #[error("The {0} has been disposed")]
  ContainerDisposed(&'static str),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::UnableToResolveService { .. } => ErrorKind::UnableToResolveService,
      Error::UnableToResolveDependency { .. } => ErrorKind::UnableToResolveDependency,
      Error::FactoryObjectIsNull { .. } => ErrorKind::FactoryObjectIsNull,
      Error::ServiceNotAssignableFromFactoryMethod { .. } => {
        ErrorKind::ServiceNotAssignableFromFactoryMethod
      }
      Error::RecursiveDependencyDetected { .. } => ErrorKind::RecursiveDependencyDetected,
      Error::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
      Error::AmbiguousService { .. } => ErrorKind::AmbiguousService,
      Error::NoMatchingScope { .. } => ErrorKind::NoMatchingScope,
      Error::NullFactoryResult { .. } => ErrorKind::NullFactoryResult,
      Error::ScopedDependencyInSingleton { .. } => ErrorKind::ScopedDependencyInSingleton,
      Error::ContainerDisposed(_) => ErrorKind::ContainerDisposed,
    }
  }

  /// Failures that a `ReturnDefault` resolution turns into an absent value.
  pub(crate) fn is_unresolved(&self) -> bool {
    matches!(
      self.kind(),
      ErrorKind::UnableToResolveService | ErrorKind::UnableToResolveDependency
    )
  }
}

/// A specialized `Result` type for `fibre_di` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
