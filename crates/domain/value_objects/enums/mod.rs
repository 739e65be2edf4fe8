pub mod order_statuses;
pub mod payment_types;
pub mod transfer_statuses;
