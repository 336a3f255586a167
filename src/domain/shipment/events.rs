use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::event_sourcing::core::{serialize_event, DomainEvent, EventRegistry, EventVariant};

// ============================================================================
// Shipment Events - Domain Events for the Shipment Aggregate
// ============================================================================

/// Shipment Event - Union type for all shipment events
#[derive(Debug, Clone, PartialEq)]
pub enum ShipmentEvent {
    PickedUp(PickedUp),
    Delivered(Delivered),
}

impl ShipmentEvent {
    /// Static registry of every tag a shipment stream may contain
    pub fn registry() -> EventRegistry<ShipmentEvent> {
        EventRegistry::new()
            .register::<PickedUp>()
            .register::<Delivered>()
    }
}

impl DomainEvent for ShipmentEvent {
    fn type_tag(&self) -> &'static str {
        match self {
            ShipmentEvent::PickedUp(_) => PickedUp::TYPE_TAG,
            ShipmentEvent::Delivered(_) => Delivered::TYPE_TAG,
        }
    }

    fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            ShipmentEvent::PickedUp(e) => serialize_event(e),
            ShipmentEvent::Delivered(e) => serialize_event(e),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Picked Up - Carrier collected the shipment
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PickedUp {
    pub at: DateTime<Utc>,
}

impl EventVariant for PickedUp {
    type Event = ShipmentEvent;
    const TYPE_TAG: &'static str = "shipment.PickedUp";
}

impl From<PickedUp> for ShipmentEvent {
    fn from(e: PickedUp) -> Self {
        ShipmentEvent::PickedUp(e)
    }
}

/// Delivered - Shipment handed to the recipient
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Delivered {
    pub at: DateTime<Utc>,
}

impl EventVariant for Delivered {
    type Event = ShipmentEvent;
    const TYPE_TAG: &'static str = "shipment.Delivered";
}

impl From<Delivered> for ShipmentEvent {
    fn from(e: Delivered) -> Self {
        ShipmentEvent::Delivered(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::encode_event;

    #[test]
    fn test_registry_covers_every_variant() {
        let registry = ShipmentEvent::registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("shipment.PickedUp"));
        assert!(registry.contains("shipment.Delivered"));
    }

    #[test]
    fn test_payload_excludes_type_tag() {
        let at = Utc::now();
        let record = encode_event(&ShipmentEvent::Delivered(Delivered { at })).unwrap();

        assert_eq!(record.type_tag, "shipment.Delivered");
        let body: serde_json::Value = serde_json::from_slice(&record.payload).unwrap();
        assert_eq!(body, serde_json::json!({ "at": at }));
    }
}
