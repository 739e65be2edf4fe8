use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transfers},
};
use domain::{
    entities::transfers::{InsertTransferEntity, TransferEntity},
    repositories::transfers::TransferRepository,
    value_objects::enums::transfer_statuses::TransferStatus,
};

pub struct TransferPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransferPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransferRepository for TransferPostgres {
    async fn claim(&self, transfer: InsertTransferEntity) -> Result<Option<TransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Relies on the unique index on payment_intent_id; RETURNING is empty on conflict.
        let claimed = insert_into(transfers::table)
            .values(&transfer)
            .on_conflict(transfers::payment_intent_id)
            .do_nothing()
            .returning(TransferEntity::as_returning())
            .get_result::<TransferEntity>(&mut conn)
            .optional()?;

        Ok(claimed)
    }

    async fn claim_retry(&self, payment_intent_id: &str) -> Result<Option<TransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let claimed = update(
            transfers::table
                .filter(transfers::payment_intent_id.eq(payment_intent_id))
                .filter(transfers::status.eq(TransferStatus::Failed.as_str())),
        )
        .set((
            transfers::status.eq(TransferStatus::Pending.as_str()),
            transfers::attempts.eq(transfers::attempts + 1),
            transfers::failure_reason.eq(None::<String>),
            transfers::updated_at.eq(Utc::now()),
        ))
        .returning(TransferEntity::as_returning())
        .get_result::<TransferEntity>(&mut conn)
        .optional()?;

        Ok(claimed)
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<TransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transfer = transfers::table
            .filter(transfers::payment_intent_id.eq(payment_intent_id))
            .select(TransferEntity::as_select())
            .first::<TransferEntity>(&mut conn)
            .optional()?;

        Ok(transfer)
    }

    async fn mark_succeeded(
        &self,
        payment_intent_id: &str,
        stripe_transfer_id: &str,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            transfers::table
                .filter(transfers::payment_intent_id.eq(payment_intent_id))
                .filter(transfers::status.ne(TransferStatus::Reversed.as_str())),
        )
        .set((
            transfers::status.eq(TransferStatus::Succeeded.as_str()),
            transfers::stripe_transfer_id.eq(Some(stripe_transfer_id)),
            transfers::failure_reason.eq(None::<String>),
            transfers::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn mark_failed(&self, payment_intent_id: &str, reason: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            transfers::table
                .filter(transfers::payment_intent_id.eq(payment_intent_id))
                .filter(transfers::status.eq(TransferStatus::Pending.as_str())),
        )
        .set((
            transfers::status.eq(TransferStatus::Failed.as_str()),
            transfers::failure_reason.eq(Some(reason)),
            transfers::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn update_status_by_stripe_transfer_id(
        &self,
        stripe_transfer_id: &str,
        status: TransferStatus,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            transfers::table.filter(transfers::stripe_transfer_id.eq(stripe_transfer_id)),
        )
        .set((
            transfers::status.eq(status.as_str()),
            transfers::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }
}
