//! Core decision logic: notification planning and transaction dedup.

pub mod dedup;
pub mod plan;
