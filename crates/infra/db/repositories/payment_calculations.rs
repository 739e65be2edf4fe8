use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_calculations},
};
use domain::{
    entities::payment_calculations::{InsertPaymentCalculationEntity, PaymentCalculationEntity},
    repositories::payment_calculations::PaymentCalculationRepository,
};

pub struct PaymentCalculationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentCalculationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentCalculationRepository for PaymentCalculationPostgres {
    async fn insert_if_absent(&self, calculation: InsertPaymentCalculationEntity) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(payment_calculations::table)
            .values(&calculation)
            .on_conflict(payment_calculations::payment_intent_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentCalculationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let calculation = payment_calculations::table
            .filter(payment_calculations::payment_intent_id.eq(payment_intent_id))
            .select(PaymentCalculationEntity::as_select())
            .first::<PaymentCalculationEntity>(&mut conn)
            .optional()?;

        Ok(calculation)
    }
}
