//! A reconciliation pass end to end, and execution of its staged writes.

use std::collections::HashSet;

use crate::config::{ReconcileOptions, WritePolicy};
use crate::error::{Error, Result};
use crate::feed::FeedFilter;
use crate::index::{build_index, SkippedCard};
use crate::interface::{ChainReader, ChainWriter, ContentStore, FantasyFeed};
use crate::model::{TransactionReceipt, UpdateOp};
use crate::reconcile::{reconcile, Diagnostic};
use crate::resolver::IdentityResolver;

/// Output of [`run_pass`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Number of feed entries considered.
    pub feed_entries: usize,
    /// Staged writes.
    pub ops: Vec<UpdateOp>,
    /// Data mismatches.
    pub diagnostics: Vec<Diagnostic>,
    /// Cards excluded from the index.
    pub skipped: Vec<SkippedCard>,
}

/// Run one reconciliation pass: fetch the feed, index every card, reconcile.
///
/// Fails (aborting only this pass) if the feed or the card listing is unavailable. Per-card
/// failures are reported in [`PassReport::skipped`]. Performs no writes.
pub async fn run_pass<C, S, F>(
    chain: &C,
    store: &S,
    feed: &F,
    filter: &FeedFilter,
    options: &ReconcileOptions,
) -> Result<PassReport>
where
    C: ChainReader + ?Sized,
    S: ContentStore + ?Sized,
    F: FantasyFeed + ?Sized,
{
    log::info!("Reconciliation pass starting, filter: {:?}", filter);
    let entries = feed
        .fetch_fantasy_feed(filter)
        .await
        .map_err(|source| Error::FeedUnavailable { source })?;
    let card_ids = chain
        .card_ids()
        .await
        .map_err(|source| Error::CardUnavailable {
            card_id: None,
            source,
        })?;

    // Fresh resolver (and cache) per pass.
    let mut resolver = IdentityResolver::new(chain, store);
    let build = build_index(&mut resolver, &card_ids).await;
    let reconciliation = reconcile(&entries, &build.index, &build.cards, options);

    log::info!(
        "Reconciliation pass done: {} feed entries, {} ops, {} diagnostics, {} skipped cards.",
        entries.len(),
        reconciliation.ops.len(),
        reconciliation.diagnostics.len(),
        build.skipped.len()
    );
    Ok(PassReport {
        feed_entries: entries.len(),
        ops: reconciliation.ops,
        diagnostics: reconciliation.diagnostics,
        skipped: build.skipped,
    })
}

/// Outcome of one write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The op.
    pub op: UpdateOp,
    /// Receipt, or why it failed.
    pub result: Result<TransactionReceipt>,
}

/// Execute each op independently; a failure never blocks or rolls back the others.
///
/// Ops repeating an already-submitted `card_id` in this batch are dropped. Retries are left to
/// `writer` (per `policy`); a non-success receipt becomes [`Error::TransactionReverted`].
pub async fn submit_updates<W>(
    writer: &W,
    ops: &[UpdateOp],
    policy: &WritePolicy,
) -> Vec<WriteOutcome>
where
    W: ChainWriter + ?Sized,
{
    let mut in_flight = HashSet::new();
    let mut outcomes = Vec::with_capacity(ops.len());
    for op in ops {
        if !in_flight.insert(op.card_id) {
            log::warn!("Dropping repeated update for card {} in batch.", op.card_id);
            continue;
        }
        let result = submit_update(writer, op, policy).await;
        outcomes.push(WriteOutcome { op: *op, result });
    }
    outcomes
}

/// Execute a single op.
pub async fn submit_update<W>(
    writer: &W,
    op: &UpdateOp,
    policy: &WritePolicy,
) -> Result<TransactionReceipt>
where
    W: ChainWriter + ?Sized,
{
    let what = format!("updateFantasyPoints({}, {})", op.card_id.0, op.new_points);
    let result = writer
        .submit_update_points(op, policy)
        .await
        .map_err(|source| Error::TransactionFailed {
            what: what.clone(),
            source,
        })
        .and_then(|receipt| check_receipt(what, receipt));
    match &result {
        Ok(receipt) => log::info!(
            "Card {} set to {} points in {}.",
            op.card_id,
            op.new_points,
            receipt.tx_hash
        ),
        Err(e) => log::error!("{}", e),
    }
    result
}

/// Turn a non-success receipt into [`Error::TransactionReverted`].
pub fn check_receipt(what: String, receipt: TransactionReceipt) -> Result<TransactionReceipt> {
    if receipt.success {
        Ok(receipt)
    } else {
        Err(Error::TransactionReverted {
            what,
            tx_hash: receipt.tx_hash,
        })
    }
}
