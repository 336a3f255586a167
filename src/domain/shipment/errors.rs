// ============================================================================
// Shipment Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShipmentError {
    #[error("Shipment has already been picked up")]
    AlreadyPickedUp,

    #[error("Shipment has already been delivered")]
    AlreadyDelivered,

    #[error("Shipment has not yet been picked up")]
    NotPickedUp,
}
