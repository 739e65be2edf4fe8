use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::orders},
};
use domain::{
    entities::orders::OrderEntity, repositories::orders::OrderRepository,
    value_objects::enums::order_statuses::OrderStatus,
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .find(order_id)
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        payment_intent_id: &str,
        total_minor: i64,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table.find(order_id))
            .set((
                orders::stripe_payment_intent_id.eq(Some(payment_intent_id)),
                orders::total_minor.eq(total_minor),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: Vec<OrderStatus>,
        to: OrderStatus,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let from: Vec<&str> = from.iter().map(OrderStatus::as_str).collect();

        let updated = update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq_any(from)),
        )
        .set((
            orders::status.eq(to.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }
}
