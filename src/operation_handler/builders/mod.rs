//! Builder utilities for operation handler types
//!
//! This module provides convenient builder methods for constructing
//! ItemOperationRequest values.

pub mod request;
