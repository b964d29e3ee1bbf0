//! Background "webjob" task handling.

use std::time::Duration;

use hodlerfc::feed::FeedFilter;
use hodlerfc::model::UpdateOp;
use hodlerfc::pass::{run_pass, submit_update};
use hodlerfc::Error as CoreError;
use web_time::{SystemTime, UNIX_EPOCH};
use worker::{query, D1Database, Env, Error, Message, Result};

use crate::db::{self, in_flight_window, UpdateStatus};
use crate::init::{get_appstate, AppState, BINDING_D1_DB, BINDING_QUEUE_WEBJOB};

/// Enum of the possible tasks for the webjob queue.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub enum Task {
    /// Run a reconciliation pass over the selected feed entries, enqueueing one
    /// [`Task::SubmitUpdate`] per staged op.
    Reconcile(FeedFilter),
    /// Write one op, unless an identical write is already in flight or confirmed.
    SubmitUpdate(UpdateOp),
}

/// Handle a `Task`. Errors are transient failures; the queue retries the message.
pub async fn handle(env: &Env, msg: Message<Task>) -> Result<Message<Task>> {
    let state = get_appstate(env)?;
    match msg.body() {
        Task::Reconcile(filter) => reconcile(env, state, filter).await?,
        &Task::SubmitUpdate(op) => {
            let db = env.d1(BINDING_D1_DB)?;
            update_points(&db, state, op).await?
        }
    }
    Result::<Message<_>>::Ok(msg)
}

/// Handle [`Task::Reconcile`].
pub async fn reconcile(env: &Env, state: AppState, filter: &FeedFilter) -> Result<()> {
    let report = run_pass(
        &state.contracts,
        &state.pinata,
        &state.feed,
        filter,
        &state.config.reconcile,
    )
    .await
    .map_err(|e| Error::RustError(e.to_string()))?;

    let queue = env.queue(BINDING_QUEUE_WEBJOB)?;
    for op in report.ops {
        queue.send(Task::SubmitUpdate(op)).await?;
    }
    Ok(())
}

fn now() -> Result<Duration> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::RustError(format!("Clock before unix epoch: {}", e)))
}

/// Handle [`Task::SubmitUpdate`].
///
/// The row for the card is claimed atomically: the upsert only applies (and returns the row)
/// if no identical write is pending within the in-flight window or already confirmed
/// (see [`db::PointUpdate::blocks`]).
pub async fn update_points(db: &D1Database, state: AppState, op: UpdateOp) -> Result<()> {
    let policy = &state.config.write_policy;
    let claimed_at = now()?;
    let cutoff = claimed_at.saturating_sub(in_flight_window(policy));

    let query = query!(db, "SELECT * FROM point_update WHERE card_id = ?1", op.card_id.0)?;
    if let Some(existing) = query.first::<db::PointUpdate>(None).await? {
        if existing.blocks(op.new_points, cutoff) {
            log::info!(
                "Card {} update to {} is {} since {:?}, skipping.",
                op.card_id,
                op.new_points,
                existing.status,
                existing.last_update
            );
            return Ok(());
        }
    }

    // Same rule as `PointUpdate::blocks`, applied atomically.
    let query = query!(
        db,
        "INSERT INTO point_update(card_id, points, status, tx_hash, last_update)
        VALUES (?1, ?2, 'pending', NULL, ?3)
        ON CONFLICT(card_id) DO UPDATE SET
            points = excluded.points,
            status = excluded.status,
            tx_hash = NULL,
            last_update = excluded.last_update
        WHERE NOT (
            point_update.points = excluded.points
            AND (
                point_update.status = 'confirmed'
                OR (point_update.status = 'pending' AND point_update.last_update > ?4)
            )
        )
        RETURNING *",
        op.card_id.0,
        op.new_points,
        claimed_at.as_millis() as u64,
        cutoff.as_millis() as u64,
    )?;
    let Some(claimed) = query.first::<db::PointUpdate>(None).await? else {
        log::info!(
            "Card {} update to {} already in flight or confirmed, skipping.",
            op.card_id,
            op.new_points
        );
        return Ok(());
    };
    log::debug!("Claimed {:?}.", claimed);

    let result = submit_update(&state.contracts, &op, policy).await;
    let (status, tx_hash) = match &result {
        Ok(receipt) => (UpdateStatus::Confirmed, Some(receipt.tx_hash.clone())),
        Err(CoreError::TransactionReverted { tx_hash, .. }) => {
            (UpdateStatus::Failed, Some(tx_hash.clone()))
        }
        Err(_) => (UpdateStatus::Failed, None),
    };
    let query = query!(
        db,
        "UPDATE point_update SET status = ?2, tx_hash = ?3, last_update = ?4
        WHERE card_id = ?1 AND points = ?5",
        op.card_id.0,
        status.as_str(),
        tx_hash,
        now()?.as_millis() as u64,
        op.new_points,
    )?;
    query.run().await?;

    match result {
        Ok(_) => Ok(()),
        // Bad op or reverted on chain: retrying will not help.
        Err(e) if !e.is_transient() => Ok(()),
        Err(e) => Err(Error::RustError(e.to_string())),
    }
}
