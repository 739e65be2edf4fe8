use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::wholesalers},
};
use domain::{
    entities::wholesalers::WholesalerEntity, repositories::wholesalers::WholesalerRepository,
    value_objects::connected_accounts::ConnectedAccountStatus,
};

pub struct WholesalerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WholesalerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WholesalerRepository for WholesalerPostgres {
    async fn find_by_id(&self, wholesaler_id: Uuid) -> Result<Option<WholesalerEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let wholesaler = wholesalers::table
            .find(wholesaler_id)
            .select(WholesalerEntity::as_select())
            .first::<WholesalerEntity>(&mut conn)
            .optional()?;

        Ok(wholesaler)
    }

    async fn set_stripe_account_id(
        &self,
        wholesaler_id: Uuid,
        stripe_account_id: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(wholesalers::table.find(wholesaler_id))
            .set((
                wholesalers::stripe_account_id.eq(Some(stripe_account_id)),
                wholesalers::onboarding_completed.eq(false),
                wholesalers::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_connected_account_status(
        &self,
        status: ConnectedAccountStatus,
    ) -> Result<Option<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let wholesaler_id = update(
            wholesalers::table
                .filter(wholesalers::stripe_account_id.eq(&status.stripe_account_id)),
        )
        .set((
            wholesalers::charges_enabled.eq(status.charges_enabled),
            wholesalers::payouts_enabled.eq(status.payouts_enabled),
            wholesalers::details_submitted.eq(status.details_submitted),
            wholesalers::transfers_capability.eq(status.transfers_capability.as_deref()),
            wholesalers::requirements_due.eq(json!(status.requirements_due)),
            wholesalers::onboarding_completed.eq(status.onboarding_completed),
            wholesalers::updated_at.eq(Utc::now()),
        ))
        .returning(wholesalers::id)
        .get_result::<Uuid>(&mut conn)
        .optional()?;

        Ok(wholesaler_id)
    }
}
