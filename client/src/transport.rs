use polyview_shared::HostMessage;

/// Outbound half of the live server connection. There is exactly one per
/// session and it is owned by whichever view the server currently considers
/// main; acknowledgement of a main-view switch hands it over.
pub trait ClientTransport {
    fn send(&mut self, message: HostMessage);
}
