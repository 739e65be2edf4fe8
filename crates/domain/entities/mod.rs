pub mod orders;
pub mod payment_calculations;
pub mod processed_webhook_events;
pub mod transfers;
pub mod wholesalers;
