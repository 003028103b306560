//! Data Transfer Objects for REST request/response serialization.
//!
//! Base-unit amounts are serialized as JSON strings to prevent precision
//! loss on u64/u128 values.

pub mod common_dto;
pub mod listing_dto;
pub mod stake_dto;
pub mod system_dto;

pub use common_dto::*;
pub use listing_dto::*;
pub use stake_dto::*;
pub use system_dto::*;
