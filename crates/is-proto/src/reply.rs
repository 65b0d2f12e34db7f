//! Reply wire format (spec §6): either a one-part error, or a four-part
//! `(error="", echoed-request, metadata, payload)` message. `metadata`/`spots`
//! replies omit the payload part (three parts total).

#[derive(Debug, Clone)]
pub enum Reply {
    /// Single-part error reply.
    Error(String),
    /// Three-part success reply with no payload (`metadata`, `spots`).
    Metadata {
        echoed_request: Vec<u8>,
        metadata: Vec<u8>,
    },
    /// Four-part success reply carrying a binary payload (`jpeg`, `blank`, `index`).
    WithPayload {
        echoed_request: Vec<u8>,
        metadata: Vec<u8>,
        payload: Vec<u8>,
    },
}

impl Reply {
    /// Render as the ordered list of message frames a transport socket sends.
    pub fn into_frames(self) -> Vec<Vec<u8>> {
        match self {
            Reply::Error(msg) => vec![msg.into_bytes()],
            Reply::Metadata {
                echoed_request,
                metadata,
            } => vec![Vec::new(), echoed_request, metadata],
            Reply::WithPayload {
                echoed_request,
                metadata,
                payload,
            } => vec![Vec::new(), echoed_request, metadata, payload],
        }
    }
}
