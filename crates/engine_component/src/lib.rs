//! # engine_component
//!
//! The "E" and "C" in ECS: entity handles, what a component is, and how the
//! components of one type are stored.
//!
//! This crate provides:
//!
//! - [`Entity`] / [`EntityAllocator`]: generational handles and the slot table
//!   that issues them.
//! - [`Component`] trait and [`ComponentTypeId`]: the contract all ECS data
//!   satisfies and its name-derived stable identity.
//! - [`ComponentStorage`] / [`AnyStorage`]: sparse-set storage, typed and
//!   type-erased.
//! - [`QueryDescriptor`] / [`Access`]: entity selection and system access
//!   declarations.
//! - [`EcsError`]: recoverable handle and storage errors.

pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod storage;

pub use component::{AssetId, Component, ComponentMeta, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, GENERATION_MAX};
pub use error::EcsError;
pub use query::{Access, QueryDescriptor};
pub use storage::{AnyStorage, ComponentStorage};
