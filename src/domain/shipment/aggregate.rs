use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::event_sourcing::core::{Aggregate, EventRegistry};
use super::value_objects::TransitStatus;
use super::events::*;
use super::commands::ShipmentCommand;
use super::errors::ShipmentError;

// ============================================================================
// Shipment Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentState {
    // Current State (derived from events)
    pub status: TransitStatus,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,

    // Revision of the last applied event
    pub position: Option<u64>,
}

impl Aggregate for ShipmentState {
    type Event = ShipmentEvent;
    type Command = ShipmentCommand;
    type Error = ShipmentError;

    const TYPE_TAG: &'static str = "ShipmentState";

    fn event_registry() -> EventRegistry<Self::Event> {
        ShipmentEvent::registry()
    }

    fn apply_event(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::PickedUp(e) => {
                self.status = TransitStatus::InTransit;
                self.picked_up_at = Some(e.at);
            }
            ShipmentEvent::Delivered(e) => {
                self.status = TransitStatus::Delivered;
                self.delivered_at = Some(e.at);
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.status.is_terminal() {
            return Err(ShipmentError::AlreadyDelivered);
        }

        match command {
            ShipmentCommand::Pickup => {
                if self.status == TransitStatus::InTransit {
                    return Err(ShipmentError::AlreadyPickedUp);
                }

                Ok(vec![ShipmentEvent::PickedUp(PickedUp { at: Utc::now() })])
            }

            ShipmentCommand::Deliver => {
                if self.status == TransitStatus::AwaitingPickup {
                    return Err(ShipmentError::NotPickedUp);
                }

                Ok(vec![ShipmentEvent::Delivered(Delivered { at: Utc::now() })])
            }
        }
    }

    fn position(&self) -> Option<u64> {
        self.position
    }

    fn set_position(&mut self, position: Option<u64>) {
        self.position = position;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
