// ============================================================================
// Shipment Domain - Business Logic for the Shipment Aggregate
// ============================================================================
//
// This module contains ALL Shipment-specific code:
// - Value objects (TransitStatus)
// - Events (PickedUp, Delivered)
// - Commands (Pickup, Deliver)
// - Errors (ShipmentError enum)
// - Aggregate state (ShipmentState with business rules)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
