//! Repository model types for Vortikal
//!
//! This crate provides the resource-level vocabulary shared by the
//! repository and the search core:
//! - [`Path`]: absolute resource URIs
//! - [`PropertyKey`] / [`PropertyTypeDefinition`] / [`PropertyValue`]: typed properties
//! - [`Principal`] / [`Privilege`] / [`Acl`]: access control
//! - [`ResourceTypeTree`]: the resource type hierarchy
//! - Common error types

#![forbid(unsafe_code)]

pub mod acl;
pub mod error;
pub mod path;
pub mod property;
pub mod resource_type;

pub use acl::{Acl, Principal, PrincipalKind, Privilege};
pub use error::{CoreError, CoreResult};
pub use path::Path;
pub use property::{Property, PropertyKey, PropertyType, PropertyTypeDefinition, PropertyValue};
pub use resource_type::ResourceTypeTree;
