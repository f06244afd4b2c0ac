//! Memoization of compiled plans by resolution signature.

use crate::core::InjectionKey;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::plan::Plan;
use crate::request::{IfUnresolved, ResolutionRequest};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// What a compiled plan depends on besides the registration set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Signature {
  service: InjectionKey,
  if_unresolved: IfUnresolved,
}

impl Signature {
  pub(crate) fn of(request: &ResolutionRequest<'_>) -> Self {
    Self {
      service: request.injection_key(),
      if_unresolved: request.if_unresolved,
    }
  }
}

/// A compiled plan and how many request levels its compile pushed below
/// the request it was compiled for.
#[derive(Clone)]
pub(crate) struct Compiled {
  pub(crate) plan: Arc<Plan>,
  pub(crate) height: usize,
}

impl Compiled {
  pub(crate) fn leaf(plan: Plan) -> Self {
    Self {
      plan: Arc::new(plan),
      height: 0,
    }
  }
}

enum State {
  Vacant,
  Compiling,
  Ready(Compiled),
}

/// One cache entry. The mutex guards only this signature.
struct PlanSlot {
  generation: u64,
  state: Mutex<State>,
  ready: Condvar,
}

impl PlanSlot {
  fn new(generation: u64) -> Self {
    Self {
      generation,
      state: Mutex::new(State::Vacant),
      ready: Condvar::new(),
    }
  }
}

/// The right to compile a slot. Dropping it without `complete` (an error or a
/// panic in the compile) hands the slot back so a waiter can take over, or
/// removes it when nobody else holds it.
struct Claim<'a> {
  cache: &'a PlanCache,
  signature: &'a Signature,
  slot: &'a Arc<PlanSlot>,
  done: bool,
}

impl Claim<'_> {
  fn complete(mut self, compiled: Compiled) {
    *self.slot.state.lock() = State::Ready(compiled);
    self.slot.ready.notify_all();
    self.done = true;
  }
}

impl Drop for Claim<'_> {
  fn drop(&mut self) {
    if self.done {
      return;
    }
    *self.slot.state.lock() = State::Vacant;
    self.slot.ready.notify_all();
    // The map and this claim hold the only references: no waiter is queued
    // and nobody can fetch the slot while the shard lock is held.
    self.cache.slots.remove_if(self.signature, |_, slot| {
      Arc::ptr_eq(slot, self.slot) && Arc::strong_count(slot) == 2
    });
  }
}

#[derive(Default)]
pub(crate) struct PlanCache {
  slots: DashMap<Signature, Arc<PlanSlot>>,
}

impl PlanCache {
  fn slot(&self, signature: &Signature, generation: u64) -> Arc<PlanSlot> {
    let mut entry = self
      .slots
      .entry(signature.clone())
      .or_insert_with(|| Arc::new(PlanSlot::new(generation)));
    if entry.generation != generation {
      *entry = Arc::new(PlanSlot::new(generation));
    }
    entry.clone()
  }

  /// Returns the cached plan for `signature`, compiling it at most once.
  ///
  /// When another thread is already compiling the same signature, a caller
  /// with `wait` set blocks until that compile finishes. Callers without
  /// `wait` (nested compiles, which may themselves hold claims) compile
  /// inline instead and do not store the result, so two threads compiling
  /// each other's dependencies can never wait on one another.
  pub(crate) fn get_or_compile(
    &self,
    signature: &Signature,
    generation: u64,
    wait: bool,
    metrics: &Metrics,
    compile: impl FnOnce() -> Result<Compiled>,
  ) -> Result<Compiled> {
    let slot = self.slot(signature, generation);

    let claim = {
      let mut state = slot.state.lock();
      loop {
        match &*state {
          State::Ready(compiled) => {
            metrics.plan_cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(service = %signature.service, "plan cache hit");
            return Ok(compiled.clone());
          }
          State::Vacant => {
            *state = State::Compiling;
            break Claim {
              cache: self,
              signature,
              slot: &slot,
              done: false,
            };
          }
          State::Compiling if wait => slot.ready.wait(&mut state),
          State::Compiling => {
            drop(state);
            return compile();
          }
        }
      }
    };

    let compiled = compile()?;
    claim.complete(compiled.clone());
    Ok(compiled)
  }

  /// Drops every cached plan.
  pub(crate) fn invalidate(&self) {
    self.slots.clear();
  }

  /// Signatures with a cached or in-flight plan. Failed compiles do not
  /// leave a slot behind.
  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }
}
