// ============================================================================
// Shipment Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentCommand {
    Pickup,
    Deliver,
}
