//! Conditional request checks
//!
//! Timestamps are compared at second precision, the resolution of HTTP dates.

use crate::{
    error::{ResourceError, ResourceResult},
    operation_handler::core::Preconditions,
    resource::{Item, header_matches},
};
use chrono::SubsecRound;

/// Check the write preconditions against the stored item.
///
/// Conditional tokens sent for an item that does not exist never match.
pub fn check_integrity(preconditions: &Preconditions, original: Option<&Item>) -> ResourceResult<()> {
    if preconditions.if_match.is_none() && preconditions.if_unmodified_since.is_none() {
        return Ok(());
    }
    let Some(original) = original else {
        return Err(ResourceError::PreconditionFailed);
    };

    if let Some(if_match) = &preconditions.if_match {
        if !header_matches(if_match, &original.etag) {
            return Err(ResourceError::PreconditionFailed);
        }
    }
    if let Some(since) = preconditions.if_unmodified_since {
        if original.updated.trunc_subsecs(0) > since {
            return Err(ResourceError::PreconditionFailed);
        }
    }
    Ok(())
}

/// Whether a read can be answered with not-modified.
pub fn is_not_modified(preconditions: &Preconditions, item: &Item) -> bool {
    if let Some(if_none_match) = &preconditions.if_none_match {
        if header_matches(if_none_match, &item.etag) {
            return true;
        }
    }
    preconditions
        .if_modified_since
        .is_some_and(|since| item.updated.trunc_subsecs(0) <= since)
}
