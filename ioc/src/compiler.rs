//! Turns resolution requests into construction plans.

use crate::binder::{ArgumentSpec, ParameterBinder};
use crate::core::InjectionKey;
use crate::descriptor::{CreationKind, FactoryDescriptor, Reuse};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::plan::{owner_is_null, Plan};
use crate::plan_cache::{Compiled, PlanCache, Signature};
use crate::registry::{Registry, Upcast};
use crate::request::{IfUnresolved, ResolutionRequest};
use crate::reuse::{ReuseKey, ReuseTarget};
use std::sync::atomic::Ordering;
use std::sync::Arc;

enum Owner {
  Found(Compiled),
  Missing,
}

pub(crate) struct PlanCompiler<'c> {
  registry: &'c Registry,
  cache: &'c PlanCache,
  metrics: &'c Metrics,
}

impl<'c> PlanCompiler<'c> {
  pub(crate) fn new(registry: &'c Registry, cache: &'c PlanCache, metrics: &'c Metrics) -> Self {
    Self {
      registry,
      cache,
      metrics,
    }
  }

  /// The plan for `request`, from the cache when possible.
  pub(crate) fn compile(&self, request: &ResolutionRequest<'_>) -> Result<Compiled> {
    let signature = Signature::of(request);
    let generation = self.registry.generation();
    let compiled = self.cache.get_or_compile(
      &signature,
      generation,
      request.is_root(),
      self.metrics,
      || self.compile_uncached(request),
    )?;
    // A cached plan was compiled under another chain, so its depth is
    // checked against this one.
    request.ensure_depth_for(compiled.height)?;
    Ok(compiled)
  }

  fn compile_uncached(&self, request: &ResolutionRequest<'_>) -> Result<Compiled> {
    self.metrics.plans_compiled.fetch_add(1, Ordering::Relaxed);
    self.metrics.registry_lookups.fetch_add(1, Ordering::Relaxed);

    let mut candidates = self.registry.lookup(request.service_type, request.key.as_ref());
    let factory = match candidates.len() {
      0 => return unresolved(request),
      1 => candidates.remove(0),
      count => {
        return Err(Error::AmbiguousService {
          service: request.injection_key().to_string(),
          count,
        })
      }
    };

    let compiled = self.compile_factory(request, &factory)?;
    tracing::debug!(
      service = %request.service_type,
      key = ?request.key,
      chain = %request.chain(),
      height = compiled.height,
      plan = ?compiled.plan,
      "compiled plan"
    );
    Ok(compiled)
  }

  fn compile_factory(
    &self,
    request: &ResolutionRequest<'_>,
    factory: &Arc<FactoryDescriptor>,
  ) -> Result<Compiled> {
    // Structural, so it is checked before anything else is compiled.
    let upcast = self.assignability(factory)?;

    let mut height = 0;
    let owner = match factory.creation_kind {
      CreationKind::InstanceFactoryMethod => match self.compile_owner(request, factory)? {
        Owner::Found(owner) => {
          height = owner.height;
          Some(owner.plan)
        }
        // The owner request was pushed before it turned out to be missing.
        Owner::Missing => {
          return Ok(Compiled {
            plan: Arc::new(Plan::Absent),
            height: 1,
          })
        }
      },
      CreationKind::Constructor | CreationKind::StaticFactoryMethod => None,
    };

    let specs = ParameterBinder::new(self.registry, self.metrics).bind(request, factory)?;
    let mut args = Vec::with_capacity(specs.len());
    for spec in specs {
      let arg = self.compile_argument(request, spec)?;
      height = height.max(arg.height);
      args.push(arg.plan);
    }

    let node = match owner {
      Some(owner) => Plan::InvokeOn {
        owner,
        factory: factory.clone(),
        args,
        upcast,
      },
      None => Plan::NewInstance {
        factory: factory.clone(),
        args,
        upcast,
      },
    };

    let target = match &factory.reuse {
      Reuse::Transient => {
        return Ok(Compiled {
          plan: Arc::new(node),
          height,
        })
      }
      Reuse::Singleton => {
        if let Some(scope) = node.captured_scope() {
          return Err(Error::ScopedDependencyInSingleton {
            service: request.injection_key().to_string(),
            scope: scope.to_owned(),
          });
        }
        ReuseTarget::Singleton
      }
      Reuse::ScopedTo(name) => ReuseTarget::Scope(name.clone()),
    };
    let plan = Plan::ReuseWrapped {
      inner: Arc::new(node),
      key: ReuseKey {
        factory: factory.id,
        service: InjectionKey::new(factory.service_type, factory.key.clone()),
        target,
      },
      disposer: factory.disposer.clone(),
    };
    Ok(Compiled {
      plan: Arc::new(plan),
      height,
    })
  }

  /// Compiles the object an instance factory method is called on. The
  /// returned height counts the owner link itself.
  ///
  /// `Owner::Missing` means the owner is not registered at all and the
  /// request tolerates absence. An owner that is registered but compiles to
  /// nothing is `FactoryObjectIsNull`, whatever the request's policy.
  fn compile_owner(
    &self,
    request: &ResolutionRequest<'_>,
    factory: &FactoryDescriptor,
  ) -> Result<Owner> {
    let Some(owner) = factory.owner.as_ref() else {
      return Err(owner_is_null(factory));
    };
    let child = request.push(owner.service_type, owner.key.clone(), request.if_unresolved)?;

    self.metrics.registry_lookups.fetch_add(1, Ordering::Relaxed);
    if !self.registry.contains(owner.service_type, owner.key.as_ref()) {
      return match request.if_unresolved {
        IfUnresolved::ReturnDefault => Ok(Owner::Missing),
        IfUnresolved::Throw => Err(Error::UnableToResolveService {
          service: format!(
            "{} (factory owner of {})",
            child.injection_key(),
            request.injection_key()
          ),
        }),
      };
    }

    let owner = self.compile(&child)?;
    if owner.plan.is_absent() {
      return Err(owner_is_null(factory));
    }
    Ok(Owner::Found(Compiled {
      plan: owner.plan,
      height: owner.height + 1,
    }))
  }

  /// Compiles one argument. The returned height counts the link to the
  /// argument when it had to be resolved.
  fn compile_argument(&self, request: &ResolutionRequest<'_>, spec: ArgumentSpec) -> Result<Compiled> {
    match spec {
      ArgumentSpec::Constant(value) => Ok(Compiled::leaf(Plan::Constant(value))),
      ArgumentSpec::Absent => Ok(Compiled::leaf(Plan::Absent)),
      ArgumentSpec::Resolve {
        service_type,
        key,
        if_unresolved,
        fallback,
      } => {
        let child = request.push(service_type, key, if_unresolved)?;
        let compiled = self.compile(&child)?;
        let plan = match fallback {
          Some(value) if compiled.plan.is_absent() => Arc::new(Plan::Constant(value)),
          _ => compiled.plan,
        };
        Ok(Compiled {
          plan,
          height: compiled.height + 1,
        })
      }
    }
  }

  fn assignability(&self, factory: &FactoryDescriptor) -> Result<Option<Upcast>> {
    if factory.implementation_type == factory.service_type {
      return Ok(None);
    }
    self
      .registry
      .upcast(factory.implementation_type, factory.service_type)
      .map(Some)
      .ok_or(Error::ServiceNotAssignableFromFactoryMethod {
        service: factory.service_type.name(),
        implementation: factory.implementation_type.name(),
        method: factory.method,
      })
  }
}

fn unresolved(request: &ResolutionRequest<'_>) -> Result<Compiled> {
  match request.if_unresolved {
    IfUnresolved::ReturnDefault => Ok(Compiled::leaf(Plan::Absent)),
    IfUnresolved::Throw => Err(Error::UnableToResolveService {
      service: request.injection_key().to_string(),
    }),
  }
}
