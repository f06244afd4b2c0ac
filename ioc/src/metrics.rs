use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe resolution counters. All fields are atomic so they can be
/// updated from any resolving thread without locking.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  pub(crate) resolutions: AtomicU64,
  pub(crate) registry_lookups: AtomicU64,
  pub(crate) plan_cache_hits: AtomicU64,
  pub(crate) plans_compiled: AtomicU64,
  pub(crate) cache_invalidations: AtomicU64,
  pub(crate) instances_created: AtomicU64,
}

impl Metrics {
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.plan_cache_hits.load(Ordering::Relaxed);
    let compiled = self.plans_compiled.load(Ordering::Relaxed);
    let total = hits + compiled;

    MetricsSnapshot {
      resolutions: self.resolutions.load(Ordering::Relaxed),
      registry_lookups: self.registry_lookups.load(Ordering::Relaxed),
      plan_cache_hits: hits,
      plans_compiled: compiled,
      plan_cache_hit_ratio: if total == 0 {
        0.0
      } else {
        hits as f64 / total as f64
      },
      cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
      instances_created: self.instances_created.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time copy of a container's resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
  /// Calls into the public resolve API, including `resolve_many` items.
  pub resolutions: u64,
  /// Registry lookups performed while compiling plans.
  pub registry_lookups: u64,
  /// Plan requests served from the plan cache.
  pub plan_cache_hits: u64,
  /// Plans built from scratch (top-level and nested).
  pub plans_compiled: u64,
  pub plan_cache_hit_ratio: f64,
  /// Times the plan cache was cleared because registrations changed.
  pub cache_invalidations: u64,
  /// Constructor or factory-method invocations.
  pub instances_created: u64,
}

impl fmt::Display for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Resolution metrics:")?;
    writeln!(f, "  resolutions:         {}", self.resolutions)?;
    writeln!(f, "  registry lookups:    {}", self.registry_lookups)?;
    writeln!(
      f,
      "  plan cache:          {} hits / {} compiled ({:.2}%)",
      self.plan_cache_hits,
      self.plans_compiled,
      self.plan_cache_hit_ratio * 100.0
    )?;
    writeln!(f, "  invalidations:       {}", self.cache_invalidations)?;
    write!(f, "  instances created:   {}", self.instances_created)
  }
}
