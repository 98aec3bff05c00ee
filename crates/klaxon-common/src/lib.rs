//! Shared data model for the klaxon alerting engine.
//!
//! Defines the tenant-scoped trigger/condition/dampening definitions, the
//! durable [`types::Alert`] record with its lifecycle fields, the query
//! [`criteria::AlertsCriteria`], and paging primitives. All services and the
//! evaluation engine build on these types.

pub mod action;
pub mod condition;
pub mod criteria;
pub mod dampening;
pub mod event;
pub mod id;
pub mod paging;
pub mod types;
