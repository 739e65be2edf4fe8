pub mod orders;
pub mod payment_calculations;
pub mod transfers;
pub mod webhook_events;
pub mod wholesalers;
