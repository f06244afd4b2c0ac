//! In-flight resolution requests and recursion detection.

use crate::core::{InjectionKey, ServiceKey, ServiceType};
use crate::error::{Error, Result};
use std::fmt::Write;

/// What a resolution does when no registration can satisfy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IfUnresolved {
  /// Fail with `UnableToResolveService` / `UnableToResolveDependency`.
  #[default]
  Throw,
  /// Produce an absent value instead.
  ReturnDefault,
}

/// One link of a resolution chain.
///
/// The parent is borrowed from the caller's stack frame, so a chain lives
/// exactly as long as the compile that built it and never owns anything.
pub(crate) struct ResolutionRequest<'a> {
  pub(crate) service_type: ServiceType,
  pub(crate) key: Option<ServiceKey>,
  pub(crate) if_unresolved: IfUnresolved,
  parent: Option<&'a ResolutionRequest<'a>>,
  depth: usize,
  max_depth: usize,
}

impl<'a> ResolutionRequest<'a> {
  pub(crate) fn root(
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
    max_depth: usize,
  ) -> Self {
    Self {
      service_type,
      key,
      if_unresolved,
      parent: None,
      depth: 0,
      max_depth,
    }
  }

  /// Creates a request for a dependency of `self`.
  ///
  /// Fails if (type, key) is already being resolved somewhere up the chain,
  /// or if the chain would exceed the configured depth.
  pub(crate) fn push(
    &self,
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<ResolutionRequest<'_>> {
    let revisits = self
      .ancestors()
      .any(|r| r.service_type == service_type && r.key == key);
    if revisits || self.depth + 1 > self.max_depth {
      let mut chain = self.chain();
      let _ = write!(chain, " -> {}", InjectionKey::new(service_type, key));
      if !revisits {
        let _ = write!(chain, " (depth limit {} exceeded)", self.max_depth);
      }
      return Err(Error::RecursiveDependencyDetected { chain });
    }

    Ok(ResolutionRequest {
      service_type,
      key,
      if_unresolved,
      parent: Some(self),
      depth: self.depth + 1,
      max_depth: self.max_depth,
    })
  }

  /// Fails if a plan that pushes `height` more levels below `self` would
  /// exceed the configured depth.
  pub(crate) fn ensure_depth_for(&self, height: usize) -> Result<()> {
    if self.depth + height <= self.max_depth {
      return Ok(());
    }
    Err(Error::RecursiveDependencyDetected {
      chain: format!(
        "{} -> ... ({} more levels; depth limit {} exceeded)",
        self.chain(),
        height,
        self.max_depth
      ),
    })
  }

  pub(crate) fn is_root(&self) -> bool {
    self.parent.is_none()
  }

  pub(crate) fn injection_key(&self) -> InjectionKey {
    InjectionKey::new(self.service_type, self.key.clone())
  }

  /// `self`, then its parent, up to the root.
  pub(crate) fn ancestors(&self) -> impl Iterator<Item = &ResolutionRequest<'a>> {
    std::iter::successors(Some(self), |r| r.parent)
  }

  /// The chain from the root down to `self`, e.g. `A -> B -> C`.
  pub(crate) fn chain(&self) -> String {
    let mut links: Vec<String> = self.ancestors().map(|r| r.injection_key().to_string()).collect();
    links.reverse();
    links.join(" -> ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  struct A;
  struct B;

  #[test]
  fn revisiting_a_pair_is_rejected() {
    let root = ResolutionRequest::root(ServiceType::of::<A>(), None, IfUnresolved::Throw, 16);
    let child = root
      .push(ServiceType::of::<B>(), None, IfUnresolved::Throw)
      .unwrap();

    let err = child
      .push(ServiceType::of::<A>(), None, IfUnresolved::Throw)
      .err()
      .unwrap();
    assert_eq!(err.kind(), ErrorKind::RecursiveDependencyDetected);
    assert!(err.to_string().contains("A -> "));
  }

  #[test]
  fn same_type_under_another_key_is_not_recursion() {
    let root = ResolutionRequest::root(ServiceType::of::<A>(), None, IfUnresolved::Throw, 16);
    let child = root.push(ServiceType::of::<A>(), Some("inner".into()), IfUnresolved::Throw);
    assert!(child.is_ok());
  }

  #[test]
  fn depth_limit_is_enforced() {
    let root = ResolutionRequest::root(ServiceType::of::<A>(), None, IfUnresolved::Throw, 1);
    let child = root.push(ServiceType::of::<B>(), None, IfUnresolved::Throw).unwrap();
    let err = child
      .push(ServiceType::of::<u8>(), None, IfUnresolved::Throw)
      .err()
      .unwrap();
    assert!(err.to_string().contains("depth limit 1 exceeded"));
    assert_eq!(child.ancestors().count(), 2);
    assert!(!child.is_root());
  }

  #[test]
  fn depth_of_a_prebuilt_subtree_is_checked() {
    let root = ResolutionRequest::root(ServiceType::of::<A>(), None, IfUnresolved::Throw, 2);
    let child = root.push(ServiceType::of::<B>(), None, IfUnresolved::Throw).unwrap();

    assert!(child.ensure_depth_for(1).is_ok());
    let err = child.ensure_depth_for(2).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::RecursiveDependencyDetected);
    assert!(err.to_string().contains("depth limit 2 exceeded"), "{}", err);
  }
}
