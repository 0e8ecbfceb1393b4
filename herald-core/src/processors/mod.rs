//! Background task handlers.
//!
//! - `PrepareBatchesHandler`: `broadcast:prepare_batches`, enqueues `broadcast:delivery`
//! - `BroadcastDeliveryHandler`: `broadcast:delivery`, settles the broadcast
//! - `DeleteRecipientDataHandler`: `recipient:delete_data`
//! - `DeleteProjectDataHandler`: `project:delete_data`

pub mod broadcast;
pub mod data_cleanup;

pub use broadcast::{
    BroadcastDeliveryHandler, BroadcastDeliveryPayload, PrepareBatchesHandler,
    PrepareBatchesPayload,
};
pub use data_cleanup::{
    DeleteProjectDataHandler, DeleteProjectDataPayload, DeleteRecipientDataHandler,
    DeleteRecipientDataPayload,
};

use crate::config::WorkerConfig;
use crate::queue::{TaskKind, TaskQueue, WorkerPool};
use sqlx::PgPool;
use tokio::sync::watch;

/// A worker pool with every task handler registered.
pub fn worker_pool(
    pool: PgPool,
    queue: TaskQueue,
    config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> WorkerPool {
    WorkerPool::new(queue.clone(), config, shutdown_rx)
        .register(
            TaskKind::BroadcastPrepareBatches,
            PrepareBatchesHandler::new(pool.clone(), queue),
        )
        .register(
            TaskKind::BroadcastDelivery,
            BroadcastDeliveryHandler::new(pool.clone()),
        )
        .register(
            TaskKind::RecipientDeleteData,
            DeleteRecipientDataHandler::new(pool.clone()),
        )
        .register(TaskKind::ProjectDeleteData, DeleteProjectDataHandler::new(pool))
}
