//! The registration store: descriptors per service type, plus the
//! assignability table used to check factory return types.

use crate::config::DuplicatePolicy;
use crate::core::{InjectionKey, Instance, ServiceKey, ServiceType};
use crate::descriptor::{FactoryDescriptor, FactoryId};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type Upcast = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

pub(crate) struct Registry {
  // Per type, descriptors in registration order. Keys are unique within a type.
  entries: DashMap<ServiceType, Vec<Arc<FactoryDescriptor>>>,
  conversions: DashMap<(ServiceType, ServiceType), Upcast>,
  next_id: AtomicU64,
  generation: AtomicU64,
  duplicate_policy: DuplicatePolicy,
}

impl Registry {
  pub(crate) fn new(duplicate_policy: DuplicatePolicy) -> Self {
    Self {
      entries: DashMap::new(),
      conversions: DashMap::new(),
      next_id: AtomicU64::new(1),
      generation: AtomicU64::new(0),
      duplicate_policy,
    }
  }

  /// Incremented on every change to registrations or conversions.
  pub(crate) fn generation(&self) -> u64 {
    self.generation.load(Ordering::Acquire)
  }

  fn bump(&self) {
    self.generation.fetch_add(1, Ordering::AcqRel);
  }

  pub(crate) fn register(&self, mut descriptor: FactoryDescriptor) -> Result<Arc<FactoryDescriptor>> {
    let mut slot = self.entries.entry(descriptor.service_type).or_default();
    let existing = slot.iter().position(|d| d.key == descriptor.key);

    if existing.is_some() && self.duplicate_policy == DuplicatePolicy::Reject {
      return Err(Error::DuplicateRegistration {
        service: InjectionKey::new(descriptor.service_type, descriptor.key.clone()).to_string(),
      });
    }

    descriptor.id = FactoryId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let descriptor = Arc::new(descriptor);
    match existing {
      // Replacement keeps the original registration position.
      Some(index) => slot[index] = descriptor.clone(),
      None => slot.push(descriptor.clone()),
    }
    drop(slot);

    self.bump();
    Ok(descriptor)
  }

  pub(crate) fn unregister(
    &self,
    service_type: ServiceType,
    key: Option<&ServiceKey>,
  ) -> Option<Arc<FactoryDescriptor>> {
    let removed = {
      let mut slot = self.entries.get_mut(&service_type)?;
      let index = slot.iter().position(|d| d.key.as_ref() == key)?;
      slot.remove(index)
    };
    self
      .entries
      .remove_if(&service_type, |_, descriptors| descriptors.is_empty());
    self.bump();
    Some(removed)
  }

  /// With a key: zero or one descriptor. Without a key: the default
  /// descriptor if there is one, otherwise every keyed descriptor.
  pub(crate) fn lookup(
    &self,
    service_type: ServiceType,
    key: Option<&ServiceKey>,
  ) -> Vec<Arc<FactoryDescriptor>> {
    let Some(slot) = self.entries.get(&service_type) else {
      return Vec::new();
    };
    match key {
      Some(key) => slot
        .iter()
        .filter(|d| d.key.as_ref() == Some(key))
        .cloned()
        .collect(),
      None => match slot.iter().find(|d| d.key.is_none()) {
        Some(default) => vec![default.clone()],
        None => slot.clone(),
      },
    }
  }

  /// Every descriptor for `service_type`, in registration order.
  pub(crate) fn lookup_many(&self, service_type: ServiceType) -> Vec<Arc<FactoryDescriptor>> {
    self
      .entries
      .get(&service_type)
      .map(|slot| slot.clone())
      .unwrap_or_default()
  }

  pub(crate) fn contains(&self, service_type: ServiceType, key: Option<&ServiceKey>) -> bool {
    !self.lookup(service_type, key).is_empty()
  }

  pub(crate) fn descriptors(&self) -> Vec<Arc<FactoryDescriptor>> {
    let mut all: Vec<_> = self
      .entries
      .iter()
      .flat_map(|slot| slot.value().clone())
      .collect();
    all.sort_by_key(|d| d.id);
    all
  }

  pub(crate) fn declare_assignable<I, S>(&self, cast: impl Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static)
  where
    I: ?Sized + Any + Send + Sync,
    S: ?Sized + Any + Send + Sync,
  {
    let upcast: Upcast = Arc::new(move |instance: &Instance| {
      instance.downcast::<I>().map(|value| Instance::new(cast(value)))
    });
    self
      .conversions
      .insert((ServiceType::of::<I>(), ServiceType::of::<S>()), upcast);
    self.bump();
  }

  pub(crate) fn upcast(&self, from: ServiceType, to: ServiceType) -> Option<Upcast> {
    self.conversions.get(&(from, to)).map(|c| c.value().clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn number(value: u32) -> FactoryDescriptor {
    FactoryDescriptor::constructor(move |_| value)
  }

  #[test]
  fn lookup_without_key_prefers_default() {
    let registry = Registry::new(DuplicatePolicy::Replace);
    registry.register(number(1).key("one")).unwrap();
    registry.register(number(0)).unwrap();
    registry.register(number(2).key("two")).unwrap();

    let found = registry.lookup(ServiceType::of::<u32>(), None);
    assert_eq!(found.len(), 1);
    assert!(found[0].service_key().is_none());

    let keyed = registry.lookup(ServiceType::of::<u32>(), Some(&"two".into()));
    assert_eq!(keyed.len(), 1);
    assert_eq!(keyed[0].service_key().map(|k| k.as_str()), Some("two"));
  }

  #[test]
  fn lookup_without_default_returns_all_keyed() {
    let registry = Registry::new(DuplicatePolicy::Replace);
    registry.register(number(1).key("one")).unwrap();
    registry.register(number(2).key("two")).unwrap();

    assert_eq!(registry.lookup(ServiceType::of::<u32>(), None).len(), 2);
    assert!(registry.lookup(ServiceType::of::<u64>(), None).is_empty());
  }

  #[test]
  fn replacement_keeps_position_and_bumps_generation() {
    let registry = Registry::new(DuplicatePolicy::Replace);
    let first = registry.register(number(1).key("a")).unwrap();
    registry.register(number(2).key("b")).unwrap();
    let before = registry.generation();

    let replaced = registry.register(number(3).key("a")).unwrap();

    assert!(registry.generation() > before);
    assert_ne!(first.id(), replaced.id());
    let all = registry.lookup_many(ServiceType::of::<u32>());
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id(), replaced.id());
  }

  #[test]
  fn reject_policy_refuses_duplicates() {
    let registry = Registry::new(DuplicatePolicy::Reject);
    registry.register(number(1)).unwrap();
    let err = registry.register(number(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
    // A different key is not a duplicate.
    registry.register(number(3).key("other")).unwrap();
  }

  #[test]
  fn unregister_removes_entry() {
    let registry = Registry::new(DuplicatePolicy::Replace);
    registry.register(number(1)).unwrap();
    assert!(registry.contains(ServiceType::of::<u32>(), None));
    assert!(registry.unregister(ServiceType::of::<u32>(), None).is_some());
    assert!(!registry.contains(ServiceType::of::<u32>(), None));
    assert!(registry.unregister(ServiceType::of::<u32>(), None).is_none());
  }
}
