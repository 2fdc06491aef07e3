//! Poll cycles and scheduled-job dispatch.

use thiserror::Error;

use crate::api::errors::ApiError;
use crate::scheduler::SchedulerError;
use crate::store::StoreError;

pub mod dispatch;
pub mod schedule;
pub mod transactions;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
