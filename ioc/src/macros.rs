//! Public macros for ergonomic service resolution.

/// Resolves a service from a container or scope, panicking on failure.
///
/// Meant for composition roots and tests, where a missing registration is a
/// programming error. The panic message carries the resolution error.
/// Use [`maybe_resolve!`] or `Container::resolve` to handle failures.
///
/// # Panics
///
/// Panics if the service cannot be resolved.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, Container};
///
/// let container = Container::new();
/// container.add_singleton(|| String::from("hello")).unwrap();
/// container.add_instance_with_name("port", 8080_u16).unwrap();
///
/// let message = resolve!(container, String);
/// assert_eq!(*message, "hello");
/// assert_eq!(*resolve!(container, u16, "port"), 8080);
/// ```
///
/// ```
/// use fibre_di::{resolve, Container};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let container = Container::new();
/// container
///   .add_singleton_trait::<dyn Greeter>(|| Arc::new(EnglishGreeter))
///   .unwrap();
///
/// let greeter = resolve!(container, trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // Trait arms come first: `trait X` must not be tried as a type.
    ($container:expr, trait $trait_ident:ident) => {
        $container
            .resolve::<dyn $trait_ident>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    ($container:expr, trait $trait_ident:ident, $name:expr) => {
        $container
            .resolve_keyed::<dyn $trait_ident>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait service with name '{}': {}",
                    $name,
                    err
                )
            })
    };

    ($container:expr, $type:ty) => {
        $container
            .resolve::<$type>()
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service {}: {}",
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };

    ($container:expr, $type:ty, $name:expr) => {
        $container
            .resolve_keyed::<$type>($name)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required service with name '{}': {}",
                    $name,
                    err
                )
            })
    };
}

/// Like [`resolve!`], but yields `None` when the service is not registered.
///
/// Only a missing registration (or a missing dependency of it) becomes
/// `None`. Any other failure, such as a dependency cycle or a missing scope,
/// still panics with the resolution error, exactly as [`resolve!`] does.
///
/// ```
/// use fibre_di::{maybe_resolve, Container};
///
/// let container = Container::new();
/// assert!(maybe_resolve!(container, String).is_none());
/// ```
#[macro_export]
macro_rules! maybe_resolve {
    (@absent_or_panic $result:expr, $service:expr) => {
        match $result {
            Ok(found) => found,
            Err(err) => panic!("Failed to resolve optional service {}: {}", $service, err),
        }
    };

    ($container:expr, trait $trait_ident:ident) => {
        $crate::maybe_resolve!(@absent_or_panic
            $container.resolve_with::<dyn $trait_ident>(None, $crate::IfUnresolved::ReturnDefault),
            std::any::type_name::<dyn $trait_ident>()
        )
    };

    ($container:expr, trait $trait_ident:ident, $name:expr) => {
        $crate::maybe_resolve!(@absent_or_panic
            $container.resolve_with::<dyn $trait_ident>(
                Some($crate::ServiceKey::from($name)),
                $crate::IfUnresolved::ReturnDefault,
            ),
            std::any::type_name::<dyn $trait_ident>()
        )
    };

    ($container:expr, $type:ty) => {
        $crate::maybe_resolve!(@absent_or_panic
            $container.resolve_with::<$type>(None, $crate::IfUnresolved::ReturnDefault),
            std::any::type_name::<$type>()
        )
    };

    ($container:expr, $type:ty, $name:expr) => {
        $crate::maybe_resolve!(@absent_or_panic
            $container.resolve_with::<$type>(
                Some($crate::ServiceKey::from($name)),
                $crate::IfUnresolved::ReturnDefault,
            ),
            std::any::type_name::<$type>()
        )
    };
}
