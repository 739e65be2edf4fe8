use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Succeeded,
    Failed,
    Reversed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Succeeded => "succeeded",
            TransferStatus::Failed => "failed",
            TransferStatus::Reversed => "reversed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransferStatus::Pending),
            "succeeded" => Some(TransferStatus::Succeeded),
            "failed" => Some(TransferStatus::Failed),
            "reversed" => Some(TransferStatus::Reversed),
            _ => None,
        }
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
