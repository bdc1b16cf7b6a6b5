use polyview_shared::{ByteReader, FrameDecoder, Serde, SerdeErr, ViewMessage};

/// In-process inbound pipe for a view without a live socket. The real
/// connection is bound to the server's main view, so data addressed to any
/// other view arrives wrapped in `ViewData` and runs through this pipe
/// instead: framing, then protocol decode. Dispatch happens in the manager
/// with the destination view's context active.
pub struct VirtualChannel {
    frames: FrameDecoder,
}

impl VirtualChannel {
    pub fn new() -> Self {
        Self {
            frames: FrameDecoder::new(),
        }
    }

    /// Runs the framing and decode stages over an inbound chunk.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<ViewMessage>, SerdeErr> {
        let mut messages = Vec::new();
        for frame in self.frames.decode(bytes)? {
            let mut reader = ByteReader::new(&frame);
            messages.push(ViewMessage::de(&mut reader)?);
        }
        Ok(messages)
    }
}

impl Default for VirtualChannel {
    fn default() -> Self {
        Self::new()
    }
}
