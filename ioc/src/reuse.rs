//! Reuse slots: at-most-once storage for singleton and scoped instances.

use crate::core::{InjectionKey, Instance};
use crate::descriptor::{DisposeFn, FactoryId};
use crate::error::{Error, Result};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which store holds a reused instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ReuseTarget {
  Singleton,
  Scope(String),
}

/// Identifies one reuse slot.
///
/// The factory id is part of the key so that replacing a registration never
/// hands out an instance built by the previous factory.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct ReuseKey {
  pub(crate) factory: FactoryId,
  pub(crate) service: InjectionKey,
  pub(crate) target: ReuseTarget,
}

impl fmt::Debug for ReuseKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ReuseKey({:?}, {:?}, {:?})", self.factory, self.service, self.target)
  }
}

/// Disposal hooks, run newest first.
#[derive(Default)]
struct DisposeBag {
  hooks: Vec<(Arc<DisposeFn>, Instance)>,
}

impl DisposeBag {
  fn push(&mut self, hook: Arc<DisposeFn>, instance: Instance) {
    self.hooks.push((hook, instance));
  }

  fn run(&mut self) -> usize {
    let count = self.hooks.len();
    while let Some((hook, instance)) = self.hooks.pop() {
      hook(&instance);
    }
    count
  }
}

type Slot = Arc<OnceCell<Option<Instance>>>;

/// One store of reuse slots: the container's singletons, or one scope.
pub(crate) struct ReuseSlots {
  owner: &'static str,
  slots: DashMap<ReuseKey, Slot>,
  disposals: Mutex<DisposeBag>,
  disposed: AtomicBool,
}

impl ReuseSlots {
  pub(crate) fn new(owner: &'static str) -> Self {
    Self {
      owner,
      slots: DashMap::new(),
      disposals: Mutex::new(DisposeBag::default()),
      disposed: AtomicBool::new(false),
    }
  }

  pub(crate) fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  pub(crate) fn ensure_live(&self) -> Result<()> {
    if self.is_disposed() {
      return Err(Error::ContainerDisposed(self.owner));
    }
    Ok(())
  }

  /// Returns the instance stored under `key`, running `create` to fill the
  /// slot if it is empty.
  ///
  /// Concurrent callers for the same key block on the slot while one of them
  /// runs `create`; callers for other keys are not affected. A failed
  /// `create` leaves the slot empty.
  pub(crate) fn get_or_create(
    &self,
    key: &ReuseKey,
    disposer: Option<&Arc<DisposeFn>>,
    create: impl FnOnce() -> Result<Option<Instance>>,
  ) -> Result<Option<Instance>> {
    self.ensure_live()?;

    // Clone the slot out so the map shard is not locked while `create` runs.
    let slot: Slot = self.slots.entry(key.clone()).or_default().value().clone();
    if let Some(value) = slot.get() {
      return Ok(value.clone());
    }

    let value = slot.get_or_try_init(|| {
      let created = create()?;
      tracing::trace!(key = ?key, present = created.is_some(), "filled reuse slot");
      if let (Some(hook), Some(instance)) = (disposer, created.as_ref()) {
        self.disposals.lock().push(hook.clone(), instance.clone());
      }
      Ok::<_, Error>(created)
    })?;
    Ok(value.clone())
  }

  pub(crate) fn len(&self) -> usize {
    self.slots.iter().filter(|slot| slot.value().get().is_some()).count()
  }

  /// Clears all slots and runs disposal hooks in reverse creation order.
  /// Returns how many hooks ran. Only the first call does anything.
  pub(crate) fn dispose(&self) -> usize {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return 0;
    }
    // Take the hooks out before running them so a hook cannot deadlock on the bag.
    let mut bag = std::mem::take(&mut *self.disposals.lock());
    let ran = bag.run();
    self.slots.clear();
    ran
  }
}

/// The state behind one open scope.
pub(crate) struct ScopeState {
  pub(crate) name: String,
  pub(crate) slots: ReuseSlots,
  pub(crate) parent: Option<Arc<ScopeState>>,
}

impl ScopeState {
  pub(crate) fn new(name: String, parent: Option<Arc<ScopeState>>) -> Self {
    Self {
      name,
      slots: ReuseSlots::new("scope"),
      parent,
    }
  }

  /// The nearest scope named `name`, starting at `self`.
  pub(crate) fn find(&self, name: &str) -> Option<&ScopeState> {
    std::iter::successors(Some(self), |s| s.parent.as_deref()).find(|s| s.name == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::ServiceType;
  use std::sync::atomic::AtomicUsize;
  use std::thread;

  fn key(target: ReuseTarget) -> ReuseKey {
    ReuseKey {
      factory: FactoryId(7),
      service: InjectionKey::new(ServiceType::of::<u32>(), None),
      target,
    }
  }

  #[test]
  fn create_runs_once_under_contention() {
    let slots = ReuseSlots::new("container");
    let calls = AtomicUsize::new(0);
    let key = key(ReuseTarget::Singleton);

    let results: Vec<Instance> = thread::scope(|s| {
      let handles: Vec<_> = (0..16)
        .map(|_| {
          s.spawn(|| {
            slots
              .get_or_create(&key, None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(20));
                Ok(Some(Instance::new(Arc::new(5_u32))))
              })
              .unwrap()
              .unwrap()
          })
        })
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| w[0].ptr_eq(&w[1])));
  }

  #[test]
  fn failed_create_leaves_slot_empty() {
    let slots = ReuseSlots::new("container");
    let key = key(ReuseTarget::Singleton);
    let err = slots
      .get_or_create(&key, None, || {
        Err(Error::UnableToResolveService {
          service: "u32".into(),
        })
      })
      .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::UnableToResolveService);
    assert_eq!(slots.len(), 0);

    let value = slots
      .get_or_create(&key, None, || Ok(Some(Instance::new(Arc::new(1_u32)))))
      .unwrap();
    assert!(value.is_some());
  }

  #[test]
  fn dispose_runs_hooks_in_reverse_order() {
    let slots = ReuseSlots::new("scope");
    let order = Arc::new(Mutex::new(Vec::new()));

    for id in 0..3_u64 {
      let order = order.clone();
      let hook: Arc<DisposeFn> = Arc::new(move |instance: &Instance| {
        order.lock().push(*instance.downcast::<u64>().unwrap());
      });
      let key = ReuseKey {
        factory: FactoryId(id),
        service: InjectionKey::new(ServiceType::of::<u64>(), None),
        target: ReuseTarget::Scope("request".into()),
      };
      slots
        .get_or_create(&key, Some(&hook), || Ok(Some(Instance::new(Arc::new(id)))))
        .unwrap();
    }

    assert_eq!(slots.dispose(), 3);
    assert_eq!(*order.lock(), vec![2, 1, 0]);
    assert_eq!(slots.dispose(), 0);
    assert!(slots.ensure_live().is_err());
  }

  #[test]
  fn find_walks_to_the_nearest_named_scope() {
    let outer = Arc::new(ScopeState::new("request".into(), None));
    let inner = ScopeState::new("unit".into(), Some(outer.clone()));
    assert_eq!(inner.find("request").map(|s| s.name.as_str()), Some("request"));
    assert_eq!(inner.find("unit").map(|s| s.name.as_str()), Some("unit"));
    assert!(inner.find("session").is_none());
  }
}
