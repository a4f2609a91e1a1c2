//! # callhub-entity
//!
//! Domain entity models for CallHub. The [`call::Call`] aggregate owns the
//! call lifecycle rules; [`call::CallRecord`] is its database row.

pub mod call;
