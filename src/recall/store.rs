// src/recall/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use tracing::error;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{DueRecall, DueRecallRow, RecallStatus},
};

#[async_trait]
pub trait RecallStore: Send + Sync {
    /// Select up to `limit` recalls that are pending and due at `now`, and mark
    /// them in progress with `claimed_at = now` so an overlapping pass cannot
    /// pick them up. Claims older than `lease` count as abandoned and are
    /// selectable again.
    async fn claim_due_recalls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<DueRecall>, StoreError>;

    /// Move `claimed_at` from `claimed_at` to `at`, right before sending.
    /// `false` means another pass has taken the recall over since.
    async fn renew_claim(
        &self,
        recall_id: Uuid,
        claimed_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Write a terminal status. Terminal recalls are never overwritten.
    async fn complete_recall(
        &self,
        recall_id: Uuid,
        status: RecallStatus,
        last_contact_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Hand a claimed recall back as pending, untouched otherwise.
    async fn release_recall(&self, recall_id: Uuid) -> Result<(), StoreError>;
}

/// Split claimed rows into usable recalls and the ids of rows that would not
/// decode. One bad row must not take the rest of the batch down with it.
pub fn partition_decoded<R>(
    rows: Vec<R>,
    id_of: impl Fn(&R) -> Option<Uuid>,
    decode: impl Fn(&R) -> Result<DueRecall, sqlx::Error>,
) -> (Vec<DueRecall>, Vec<Uuid>) {
    let mut recalls = Vec::with_capacity(rows.len());
    let mut broken = Vec::new();

    for row in &rows {
        match decode(row) {
            Ok(recall) => recalls.push(recall),
            Err(e) => {
                let recall_id = id_of(row);
                error!(?recall_id, "claimed recall could not be decoded: {e}");
                if let Some(id) = recall_id {
                    broken.push(id);
                }
            }
        }
    }

    (recalls, broken)
}

pub struct PgRecallStore {
    db: PgPool,
}

impl PgRecallStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecallStore for PgRecallStore {
    async fn claim_due_recalls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<DueRecall>, StoreError> {
        let stale_before = now - lease;

        let mut tx = self.db.begin().await?;

        // Only recalls whose patient and rule exist are claimable; anything else
        // would be claimed and then dropped by the joins below.
        // Never-claimed recalls first, so a recall released every pass
        // (no channel, undecodable row) cannot crowd out the rest.
        let rows: Vec<PgRow> = sqlx::query(
            r#"
            WITH claimed AS (
              UPDATE recall r
              SET status = 3, claimed_at = $1
              WHERE r.recall_id IN (
                SELECT rc.recall_id
                FROM recall rc
                WHERE rc.due_at <= $1
                  AND (
                    rc.status = 0
                    OR (rc.status = 3 AND rc.claimed_at < $2)
                  )
                  AND EXISTS (SELECT 1 FROM patient p WHERE p.patient_id = rc.patient_id)
                  AND EXISTS (SELECT 1 FROM recall_rule rr WHERE rr.rule_id = rc.rule_id)
                ORDER BY rc.claimed_at ASC NULLS FIRST
                LIMIT $3
                FOR UPDATE SKIP LOCKED
              )
              RETURNING r.recall_id, r.patient_id, r.rule_id, r.due_at, r.status, r.last_contact_at
            )
            SELECT
              c.recall_id,
              c.due_at,
              c.status,
              c.last_contact_at,

              p.patient_id,
              p.first_name,
              p.last_name,
              p.email,
              ph.phone_number,

              rr.rule_id,
              rr.channel,
              rr.service_type,
              rr.email_subject,
              rr.message
            FROM claimed c
            JOIN patient p ON p.patient_id = c.patient_id
            JOIN recall_rule rr ON rr.rule_id = c.rule_id
            LEFT JOIN LATERAL (
              SELECT pn.phone_number
              FROM phone_number pn
              WHERE pn.patient_id = p.patient_id
              ORDER BY pn.is_primary DESC, pn.created_at ASC
              LIMIT 1
            ) ph ON true
            "#,
        )
        .bind(now)
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let (recalls, broken) = partition_decoded(
            rows,
            |row| row.try_get::<Uuid, _>("recall_id").ok(),
            |row| DueRecallRow::from_row(row).map(DueRecall::from),
        );

        // Undecodable rows go back to pending behind everything never claimed.
        if !broken.is_empty() {
            sqlx::query(
                r#"
                UPDATE recall
                SET status = 0
                WHERE recall_id = ANY($1)
                  AND status = 3
                "#,
            )
            .bind(&broken)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(recalls)
    }

    async fn renew_claim(
        &self,
        recall_id: Uuid,
        claimed_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE recall
            SET claimed_at = $3
            WHERE recall_id = $1
              AND status = 3
              AND claimed_at = $2
            "#,
        )
        .bind(recall_id)
        .bind(claimed_at)
        .bind(at)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn complete_recall(
        &self,
        recall_id: Uuid,
        status: RecallStatus,
        last_contact_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal(status));
        }

        let res = sqlx::query(
            r#"
            UPDATE recall
            SET status = $2, last_contact_at = $3
            WHERE recall_id = $1
              AND status IN (0, 3)
            "#,
        )
        .bind(recall_id)
        .bind(status as i16)
        .bind(last_contact_at)
        .execute(&self.db)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotClaimable(recall_id));
        }
        Ok(())
    }

    async fn release_recall(&self, recall_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE recall
            SET status = 0
            WHERE recall_id = $1
              AND status = 3
            "#,
        )
        .bind(recall_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
