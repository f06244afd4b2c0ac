//! Construction plans and their realization.
//!
//! A plan is an immutable tree (a DAG once sub-plans are shared through the
//! plan cache) describing how to build an instance. Compiling a plan has no
//! side effects; [`Plan::realize`] is where constructors and factory methods
//! actually run.

use crate::core::Instance;
use crate::descriptor::{Arguments, Callable, DisposeFn, FactoryDescriptor};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::registry::Upcast;
use crate::reuse::{ReuseKey, ReuseSlots, ReuseTarget, ScopeState};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) enum Plan {
  /// Call a constructor or static factory method.
  NewInstance {
    factory: Arc<FactoryDescriptor>,
    args: Vec<Arc<Plan>>,
    upcast: Option<Upcast>,
  },
  /// Realize `owner`, then call an instance factory method on it.
  InvokeOn {
    owner: Arc<Plan>,
    factory: Arc<FactoryDescriptor>,
    args: Vec<Arc<Plan>>,
    upcast: Option<Upcast>,
  },
  Constant(Instance),
  /// Realize `inner` at most once per reuse key.
  ReuseWrapped {
    inner: Arc<Plan>,
    key: ReuseKey,
    disposer: Option<Arc<DisposeFn>>,
  },
  /// Nothing could be resolved and the request tolerated that.
  Absent,
}

/// Where reused instances live while a plan is realized.
pub(crate) struct RealizeContext<'s> {
  pub(crate) singletons: &'s ReuseSlots,
  pub(crate) scope: Option<&'s ScopeState>,
  pub(crate) metrics: &'s Metrics,
}

impl RealizeContext<'_> {
  fn slots_for(&self, key: &ReuseKey) -> Result<&ReuseSlots> {
    match &key.target {
      ReuseTarget::Singleton => Ok(self.singletons),
      ReuseTarget::Scope(name) => self
        .scope
        .and_then(|scope| scope.find(name))
        .map(|scope| &scope.slots)
        .ok_or_else(|| Error::NoMatchingScope {
          scope: name.clone(),
          service: key.service.to_string(),
        }),
    }
  }
}

impl Plan {
  pub(crate) fn is_absent(&self) -> bool {
    matches!(self, Plan::Absent)
  }

  /// The scope name of the first scoped instance this plan would build into
  /// its result, looking through transient nodes only. Reused nodes other
  /// than scoped ones were checked when they were compiled.
  pub(crate) fn captured_scope(&self) -> Option<&str> {
    match self {
      Plan::NewInstance { args, .. } => args.iter().find_map(|arg| arg.captured_scope()),
      Plan::InvokeOn { owner, args, .. } => owner
        .captured_scope()
        .or_else(|| args.iter().find_map(|arg| arg.captured_scope())),
      Plan::ReuseWrapped { key, .. } => match &key.target {
        ReuseTarget::Scope(name) => Some(name.as_str()),
        ReuseTarget::Singleton => None,
      },
      Plan::Constant(_) | Plan::Absent => None,
    }
  }

  pub(crate) fn realize(&self, ctx: &RealizeContext<'_>) -> Result<Option<Instance>> {
    match self {
      Plan::Absent => Ok(None),
      Plan::Constant(value) => Ok(Some(value.clone())),
      Plan::NewInstance {
        factory,
        args,
        upcast,
      } => {
        let arguments = realize_arguments(factory, args, ctx)?;
        let produced = match &factory.callable {
          Callable::Create(create) => create(&arguments),
          // The compiler never pairs an invoke callable with NewInstance.
          Callable::Invoke(_) => None,
        };
        ctx.metrics.instances_created.fetch_add(1, Ordering::Relaxed);
        convert(factory, produced, upcast.as_ref())
      }
      Plan::InvokeOn {
        owner,
        factory,
        args,
        upcast,
      } => {
        let owner_instance = owner.realize(ctx)?.ok_or_else(|| owner_is_null(factory))?;
        let arguments = realize_arguments(factory, args, ctx)?;
        let produced = match &factory.callable {
          Callable::Invoke(invoke) => invoke(&owner_instance, &arguments),
          Callable::Create(create) => create(&arguments),
        };
        ctx.metrics.instances_created.fetch_add(1, Ordering::Relaxed);
        convert(factory, produced, upcast.as_ref())
      }
      Plan::ReuseWrapped {
        inner,
        key,
        disposer,
      } => ctx
        .slots_for(key)?
        .get_or_create(key, disposer.as_ref(), || inner.realize(ctx)),
    }
  }
}

pub(crate) fn owner_is_null(factory: &FactoryDescriptor) -> Error {
  let owner = factory
    .owner
    .as_ref()
    .map(|o| crate::core::InjectionKey::new(o.service_type, o.key.clone()).to_string())
    .unwrap_or_default();
  Error::FactoryObjectIsNull {
    owner,
    service: factory.service_type.name().to_owned(),
    method: factory.method,
  }
}

fn realize_arguments(
  factory: &FactoryDescriptor,
  args: &[Arc<Plan>],
  ctx: &RealizeContext<'_>,
) -> Result<Arguments> {
  let mut values = Vec::with_capacity(args.len());
  let mut names = Vec::with_capacity(args.len());
  for (plan, parameter) in args.iter().zip(&factory.parameters) {
    // A nullable factory can come back empty at run time; fall back to the
    // parameter's default, and only fail when the parameter is required.
    let value = match plan.realize(ctx)? {
      Some(value) => Some(value),
      None => parameter.default.clone(),
    };
    if value.is_none() && !parameter.optional {
      return Err(Error::NullFactoryResult {
        service: format!(
          "{} (parameter '{}' of {})",
          parameter.ty, parameter.name, factory.service_type
        ),
      });
    }
    values.push(value);
    names.push(parameter.name);
  }
  Ok(Arguments::new(values, names))
}

fn convert(
  factory: &FactoryDescriptor,
  produced: Option<Instance>,
  upcast: Option<&Upcast>,
) -> Result<Option<Instance>> {
  let (Some(instance), Some(upcast)) = (produced.as_ref(), upcast) else {
    return Ok(produced);
  };
  match upcast(instance) {
    Some(converted) => Ok(Some(converted)),
    None => Err(Error::ServiceNotAssignableFromFactoryMethod {
      service: factory.service_type.name(),
      implementation: instance.service_type().name(),
      method: factory.method,
    }),
  }
}

impl fmt::Debug for Plan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Plan::NewInstance { factory, args, .. } => f
        .debug_struct("NewInstance")
        .field("method", &factory.method)
        .field("args", args)
        .finish(),
      Plan::InvokeOn {
        owner,
        factory,
        args,
        ..
      } => f
        .debug_struct("InvokeOn")
        .field("owner", owner)
        .field("method", &factory.method)
        .field("args", args)
        .finish(),
      Plan::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
      Plan::ReuseWrapped { inner, key, .. } => f
        .debug_struct("ReuseWrapped")
        .field("key", key)
        .field("inner", inner)
        .finish(),
      Plan::Absent => f.write_str("Absent"),
    }
  }
}
