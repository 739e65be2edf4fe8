pub mod connected_accounts;
pub mod enums;
pub mod fees;
pub mod payment_intents;
pub mod payment_split;
pub mod transfers;
