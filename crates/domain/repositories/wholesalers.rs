use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::wholesalers::WholesalerEntity,
    value_objects::connected_accounts::ConnectedAccountStatus,
};

#[automock]
#[async_trait]
pub trait WholesalerRepository {
    async fn find_by_id(&self, wholesaler_id: Uuid) -> Result<Option<WholesalerEntity>>;

    async fn set_stripe_account_id(&self, wholesaler_id: Uuid, stripe_account_id: &str)
    -> Result<()>;

    /// Stores the snapshot on the wholesaler owning `status.stripe_account_id`.
    /// Returns that wholesaler's id, or `None` when no wholesaler owns the account.
    async fn update_connected_account_status(
        &self,
        status: ConnectedAccountStatus,
    ) -> Result<Option<Uuid>>;
}
