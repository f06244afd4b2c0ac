//! # Fibre DI
//!
//! A thread-safe dependency-injection container that compiles every
//! resolution into a cached construction plan.
//!
//! Services are registered as explicit [`FactoryDescriptor`]s: a constructor,
//! a static factory method, or an instance factory method invoked on another
//! resolved service. The first resolution of a (type, key) walks the
//! registrations, binds each parameter and checks the whole dependency graph
//! up front. The resulting plan is cached until the registrations change, so
//! later resolutions only run the factories.
//!
//! ## Core Concepts
//!
//! - **Container**: Holds registrations, cached plans and singletons. There is
//!   no process-wide container; create one and pass it around.
//! - **Descriptors**: Say how a service is built, which parameters it takes,
//!   how they are bound, and how long the result is reused.
//! - **Keys**: Several implementations of one type are told apart by a
//!   [`ServiceKey`].
//! - **Reuse**: Transient, singleton, or scoped to a named [`Scope`].
//! - **Resolution**: `resolve`, `try_resolve` and `resolve_many` on the
//!   container or a scope, plus the panicking [`resolve!`] macro.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{resolve, Container, FactoryDescriptor, Parameter};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!     message: Arc<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         (*self.message).clone()
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .add_instance_with_name("greeting_message", String::from("Hello, World!"))
//!     .unwrap();
//!
//! // The constructor's parameter is bound to the keyed String.
//! container.declare_assignable::<EnglishGreeter, dyn Greeter>(|g| g);
//! container
//!     .register(
//!         FactoryDescriptor::constructor(|args| EnglishGreeter { message: args.get(0) })
//!             .param(Parameter::of::<String>("message").keyed("greeting_message"))
//!             .service::<dyn Greeter>()
//!             .singleton(),
//!     )
//!     .unwrap();
//!
//! let greeter = resolve!(container, trait Greeter);
//! assert_eq!(greeter.greet(), "Hello, World!");
//! ```

mod binder;
mod compiler;
mod config;
mod container;
mod core;
mod descriptor;
mod error;
mod macros;
mod metrics;
mod plan;
mod plan_cache;
mod registry;
mod request;
mod reuse;
mod scope;

pub use crate::core::{Instance, ServiceKey, ServiceType};
pub use config::{ContainerBuilder, ContainerConfig, DuplicatePolicy};
pub use container::{Container, ResolveMany, ResolveManyIter};
pub use descriptor::{
  Arguments, Binding, CreationKind, FactoryDescriptor, FactoryId, OwnerSpec, ParamSelector, Parameter,
  Reuse,
};
pub use error::{Error, ErrorKind, Result};
pub use metrics::MetricsSnapshot;
pub use request::IfUnresolved;
pub use scope::Scope;
