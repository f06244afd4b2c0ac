//! Binds each declared parameter of a factory to an argument source.

use crate::core::{Instance, ServiceKey, ServiceType};
use crate::descriptor::{Binding, FactoryDescriptor, Parameter};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::request::{IfUnresolved, ResolutionRequest};
use std::sync::atomic::Ordering;

/// Where one argument comes from.
#[derive(Debug)]
pub(crate) enum ArgumentSpec {
  Constant(Instance),
  Absent,
  /// Resolve a nested request. `fallback` replaces an absent result.
  Resolve {
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
    fallback: Option<Instance>,
  },
}

pub(crate) struct ParameterBinder<'c> {
  registry: &'c Registry,
  metrics: &'c Metrics,
}

impl<'c> ParameterBinder<'c> {
  pub(crate) fn new(registry: &'c Registry, metrics: &'c Metrics) -> Self {
    Self { registry, metrics }
  }

  /// One argument spec per parameter, in declaration order.
  pub(crate) fn bind(
    &self,
    request: &ResolutionRequest<'_>,
    factory: &FactoryDescriptor,
  ) -> Result<Vec<ArgumentSpec>> {
    factory
      .parameters
      .iter()
      .enumerate()
      .map(|(position, parameter)| self.bind_parameter(request, factory, position, parameter))
      .collect()
  }

  fn bind_parameter(
    &self,
    request: &ResolutionRequest<'_>,
    factory: &FactoryDescriptor,
    position: usize,
    parameter: &Parameter,
  ) -> Result<ArgumentSpec> {
    match factory.binding_for(position, parameter.name) {
      Some(Binding::Value(value)) => {
        if value.service_type() != parameter.ty {
          return Err(dependency_error(
            request,
            parameter,
            format!("bound value has type {}", value.service_type()),
          ));
        }
        Ok(ArgumentSpec::Constant(value.clone()))
      }
      Some(Binding::Keyed(key)) => self.lookup(request, parameter, Some(key.clone())),
      None => self.lookup(request, parameter, parameter.key.clone()),
    }
  }

  fn lookup(
    &self,
    request: &ResolutionRequest<'_>,
    parameter: &Parameter,
    key: Option<ServiceKey>,
  ) -> Result<ArgumentSpec> {
    self.metrics.registry_lookups.fetch_add(1, Ordering::Relaxed);
    if self.registry.contains(parameter.ty, key.as_ref()) {
      let if_unresolved = if parameter.tolerates_absence() {
        IfUnresolved::ReturnDefault
      } else {
        IfUnresolved::Throw
      };
      return Ok(ArgumentSpec::Resolve {
        service_type: parameter.ty,
        key,
        if_unresolved,
        fallback: parameter.default.clone(),
      });
    }

    if let Some(default) = &parameter.default {
      if default.service_type() != parameter.ty {
        return Err(dependency_error(
          request,
          parameter,
          format!("default value has type {}", default.service_type()),
        ));
      }
      return Ok(ArgumentSpec::Constant(default.clone()));
    }

    if parameter.optional {
      return Ok(ArgumentSpec::Absent);
    }

    let reason = match key {
      Some(key) => format!("nothing registered under key {:?}", key.as_str()),
      None => "nothing registered for the parameter type".to_owned(),
    };
    Err(dependency_error(request, parameter, reason))
  }
}

fn dependency_error(request: &ResolutionRequest<'_>, parameter: &Parameter, reason: String) -> Error {
  Error::UnableToResolveDependency {
    parameter: parameter.name.to_owned(),
    parameter_type: parameter.ty.name(),
    service: request.injection_key().to_string(),
    reason,
  }
}
