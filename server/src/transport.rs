use polyview_shared::ViewMessage;

/// Outbound half of the connection to the client. The transport layer
/// behind this seam owns framing, encryption and delivery.
pub trait ServerTransport {
    fn send(&mut self, message: ViewMessage);
}
