use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Value of the `payment_type` metadata key on payment intents issued by this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentType {
    /// Platform is merchant of record; the wholesaler share is transferred after capture.
    PlatformFirstV2,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::PlatformFirstV2 => "platform_first_v2",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "platform_first_v2" => Some(PaymentType::PlatformFirstV2),
            _ => None,
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
