//! Container options and the builder that applies them.

use crate::container::Container;

/// What `register` does when (service type, key) is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DuplicatePolicy {
  /// The newer registration replaces the older one.
  #[default]
  Replace,
  /// The newer registration fails with `DuplicateRegistration`.
  Reject,
}

/// Options fixed for the lifetime of a [`Container`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerConfig {
  pub duplicate_policy: DuplicatePolicy,
  /// Longest dependency chain a single resolution may build, counting
  /// links inside sub-plans that are already cached.
  pub max_resolution_depth: usize,
}

pub(crate) const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 256;

impl Default for ContainerConfig {
  fn default() -> Self {
    Self {
      duplicate_policy: DuplicatePolicy::Replace,
      max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
    }
  }
}

/// A builder for creating [`Container`] instances.
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
  config: ContainerConfig,
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an existing configuration, e.g. one deserialized elsewhere.
  pub fn from_config(config: ContainerConfig) -> Self {
    Self { config }
  }

  /// Sets how duplicate (type, key) registrations are handled.
  pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
    self.config.duplicate_policy = policy;
    self
  }

  /// Shorthand for `duplicate_policy(DuplicatePolicy::Reject)`.
  pub fn reject_duplicates(self) -> Self {
    self.duplicate_policy(DuplicatePolicy::Reject)
  }

  /// Caps the depth of a dependency chain. A value of zero is raised to one.
  pub fn max_resolution_depth(mut self, depth: usize) -> Self {
    self.config.max_resolution_depth = depth.max(1);
    self
  }

  pub fn build(self) -> Container {
    Container::with_config(self.config)
  }
}
