//! HTTP route handlers.

pub mod appointments;
pub mod billings;
pub mod carts;
pub mod catalog;
pub mod ops;

use common::AggregateId;

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
