use serde::{Deserialize, Serialize};

// ============================================================================
// Shipment Value Objects
// ============================================================================

/// Linear shipment lifecycle: AwaitingPickup -> InTransit -> Delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitStatus {
    #[default]
    AwaitingPickup,
    InTransit,
    Delivered,
}

impl TransitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransitStatus::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_awaiting_pickup() {
        assert_eq!(TransitStatus::default(), TransitStatus::AwaitingPickup);
    }

    #[test]
    fn test_only_delivered_is_terminal() {
        assert!(!TransitStatus::AwaitingPickup.is_terminal());
        assert!(!TransitStatus::InTransit.is_terminal());
        assert!(TransitStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TransitStatus::InTransit).unwrap();
        assert_eq!(json, "\"InTransit\"");
        let status: TransitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, TransitStatus::InTransit);
    }
}
