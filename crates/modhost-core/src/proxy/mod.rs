//! # Modhost Proxy Factory
//!
//! Lets one mod call another mod's API through an interface it declared
//! itself, with no compiled contract shared between the two.
//!
//! Providers expose a [`DynamicApi`] (usually an [`ApiTable`] built from
//! closures). Consumers declare the members they need with
//! [`define_interface!`](crate::define_interface) and ask the
//! [`ProxyFactory`] for an adapter. Members match by name, arity and
//! per-parameter assignability ([`is_assignable`]); any interface member
//! with no match fails generation immediately, naming the member.
//! Interface-typed return values are wrapped in nested proxies on the fly.
//!
//! ## Submodules
//! - **[`value`]**: [`Value`], [`ValueType`] and the [`ApiType`] conversions.
//! - **[`shape`]**: [`MethodSignature`], [`InterfaceShape`] and matching.
//! - **[`object`]**: the provider side ([`DynamicApi`], [`ApiTable`]).
//! - **[`factory`]**: [`ProxyFactory`], [`Proxy`] and [`BridgeInterface`].
//! - **[`interface`]**: the `define_interface!` macro.
pub mod error;
pub mod factory;
pub mod interface;
pub mod object;
pub mod shape;
pub mod value;

pub use error::ProxyError;
pub use factory::{BridgeInterface, Proxy, ProxyFactory};
pub use object::{ApiObject, ApiTable, DynamicApi, IntoMethod};
pub use shape::{InterfaceShape, MethodSignature, bind, is_assignable, same_shape};
pub use value::{ApiType, ShapeRef, Value, ValueType};

#[cfg(test)]
mod tests;
