// ============================================================================
// Actors Module
// ============================================================================
//
// Actix hosts for aggregates. Each actor owns the in-memory state of one
// aggregate id and drives the storage adapter for it.
//
// ============================================================================

mod shipment_actor;

pub use shipment_actor::{
    Deactivate, Deliver, GetStatus, Pickup, ShipmentActor, ShipmentActorError,
};
