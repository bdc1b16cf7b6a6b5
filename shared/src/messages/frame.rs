use crate::messages::codec::SerdeErr;

// Frame lengths fit in a 3-byte varint, same limit as the transport's real
// frame splitter. Anything longer is treated as malformed input.
const MAX_PREFIX_BYTES: usize = 3;

/// Prepends the varint length prefix to a payload
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) {
    let mut length = payload.len() as u64;
    loop {
        let mut byte = (length & 0x7f) as u8;
        length >>= 7;
        if length != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if length == 0 {
            break;
        }
    }
    out.extend_from_slice(payload);
}

/// Incremental frame reassembler for an in-process inbound pipe. Mirrors
/// the first stage of the live connection's decode pipeline: bytes may
/// arrive split or concatenated arbitrarily; complete frames come out.
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed inbound bytes; returns every frame now complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, SerdeErr> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            let Some((length, prefix_len)) = read_prefix(&self.buffer)? else {
                break;
            };
            if self.buffer.len() < prefix_len + length {
                break;
            }
            let frame = self.buffer[prefix_len..prefix_len + length].to_vec();
            self.buffer.drain(..prefix_len + length);
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes buffered while waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the length prefix at the start of `buffer`, if complete.
fn read_prefix(buffer: &[u8]) -> Result<Option<(usize, usize)>, SerdeErr> {
    let mut length: u64 = 0;
    for (index, byte) in buffer.iter().enumerate() {
        length |= u64::from(byte & 0x7f) << (7 * index as u32);
        if byte & 0x80 == 0 {
            return Ok(Some((length as usize, index + 1)));
        }
        // The last permitted prefix byte must terminate the varint
        if index + 1 >= MAX_PREFIX_BYTES {
            return Err(SerdeErr::FramePrefixTooLong);
        }
    }
    Ok(None)
}
