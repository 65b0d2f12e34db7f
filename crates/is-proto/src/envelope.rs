//! Envelope-frame bookkeeping for the router's transport-facing socket
//! (spec §4.3/§5): the routing-identity frames preceding a payload, read
//! until a zero-length delimiter or a frame-count cap, then replayed
//! bit-exact on the reply path.

use is_domain::error::{IsError, Result};

/// Maximum routing frames accepted before a request is fatal (spec §4.3:
/// "cap exhaustion is fatal").
pub const MAX_ENVELOPE_FRAMES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    frames: Vec<Vec<u8>>,
}

impl Envelope {
    /// Build an envelope from routing frames collected up to (but not
    /// including) the zero-length delimiter.
    pub fn from_frames(frames: Vec<Vec<u8>>) -> Result<Envelope> {
        if frames.len() > MAX_ENVELOPE_FRAMES {
            return Err(IsError::TransportError(format!(
                "envelope exceeded {MAX_ENVELOPE_FRAMES} frames"
            )));
        }
        Ok(Envelope { frames })
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Prefix these routing frames (plus the empty delimiter) onto a
    /// message's remaining parts, for bit-exact reply forwarding.
    pub fn prefix(&self, mut rest: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.frames.len() + 1 + rest.len());
        out.extend(self.frames.iter().cloned());
        out.push(Vec::new());
        out.append(&mut rest);
        out
    }
}

/// Consume frames from an iterator, stopping at the first empty frame
/// (the delimiter). Returns an error if the cap is exceeded before a
/// delimiter is seen.
pub fn read_envelope<I: Iterator<Item = Vec<u8>>>(mut frames: I) -> Result<Envelope> {
    let mut collected = Vec::new();
    loop {
        match frames.next() {
            Some(f) if f.is_empty() => return Envelope::from_frames(collected),
            Some(f) => {
                collected.push(f);
                if collected.len() > MAX_ENVELOPE_FRAMES {
                    return Err(IsError::TransportError(format!(
                        "envelope exceeded {MAX_ENVELOPE_FRAMES} frames"
                    )));
                }
            }
            None => {
                return Err(IsError::TransportError(
                    "stream ended before envelope delimiter".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_until_delimiter() {
        let frames = vec![b"id1".to_vec(), b"id2".to_vec(), Vec::new(), b"payload".to_vec()];
        let env = read_envelope(frames.into_iter()).unwrap();
        assert_eq!(env.frames(), &[b"id1".to_vec(), b"id2".to_vec()]);
    }

    #[test]
    fn prefix_round_trips_bit_exact() {
        let env = Envelope::from_frames(vec![b"a".to_vec(), b"b".to_vec()]).unwrap();
        let out = env.prefix(vec![b"payload".to_vec()]);
        assert_eq!(out, vec![b"a".to_vec(), b"b".to_vec(), Vec::new(), b"payload".to_vec()]);
    }

    #[test]
    fn cap_exhaustion_is_fatal() {
        let frames = vec![Vec::new(); 0]
            .into_iter()
            .chain((0..MAX_ENVELOPE_FRAMES + 1).map(|i| i.to_string().into_bytes()));
        assert!(read_envelope(frames).is_err());
    }
}
