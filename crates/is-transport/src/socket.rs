//! Zero-high-water-mark socket construction and multipart send/recv
//! helpers (spec §4.3/§4.4). Grounded on `isMain.c`'s `zmq_socket` +
//! `zmq_setsockopt(..., ZMQ_RCVHWM/ZMQ_SNDHWM, 0, ...)` sequence: an
//! unbounded high-water-mark matches the original's choice to never drop
//! messages under backpressure, relying on TCP/IPC buffering instead.

use is_domain::error::{IsError, Result};

fn new_socket(ctx: &zmq::Context, kind: zmq::SocketType) -> Result<zmq::Socket> {
    let socket = ctx
        .socket(kind)
        .map_err(|e| IsError::TransportError(format!("zmq_socket failed: {e}")))?;
    socket
        .set_rcvhwm(0)
        .map_err(|e| IsError::TransportError(format!("set_rcvhwm failed: {e}")))?;
    socket
        .set_sndhwm(0)
        .map_err(|e| IsError::TransportError(format!("set_sndhwm failed: {e}")))?;
    Ok(socket)
}

pub fn new_router(ctx: &zmq::Context) -> Result<zmq::Socket> {
    new_socket(ctx, zmq::ROUTER)
}

pub fn new_dealer(ctx: &zmq::Context) -> Result<zmq::Socket> {
    new_socket(ctx, zmq::DEALER)
}

pub fn new_rep(ctx: &zmq::Context) -> Result<zmq::Socket> {
    new_socket(ctx, zmq::REP)
}

pub fn bind(socket: &zmq::Socket, endpoint: &str) -> Result<()> {
    socket
        .bind(endpoint)
        .map_err(|e| IsError::TransportError(format!("zmq_bind {endpoint} failed: {e}")))
}

pub fn connect(socket: &zmq::Socket, endpoint: &str) -> Result<()> {
    socket
        .connect(endpoint)
        .map_err(|e| IsError::TransportError(format!("zmq_connect {endpoint} failed: {e}")))
}

/// Send every frame of a multipart message, setting `SNDMORE` on all but
/// the last (spec §4.3: "forward all message parts verbatim").
pub fn send_multipart(socket: &zmq::Socket, frames: Vec<Vec<u8>>) -> Result<()> {
    let last = frames.len().saturating_sub(1);
    for (i, frame) in frames.into_iter().enumerate() {
        let flags = if i == last { 0 } else { zmq::SNDMORE };
        socket
            .send(frame, flags)
            .map_err(|e| IsError::TransportError(format!("zmq_send failed: {e}")))?;
    }
    Ok(())
}

/// Receive every frame of one multipart message.
pub fn recv_multipart(socket: &zmq::Socket) -> Result<Vec<Vec<u8>>> {
    socket
        .recv_multipart(0)
        .map_err(|e| IsError::TransportError(format!("zmq_recv failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_dealer_roundtrip_over_inproc() {
        let ctx = zmq::Context::new();
        let router = new_router(&ctx).unwrap();
        let dealer = new_dealer(&ctx).unwrap();

        bind(&router, "inproc://is-transport-test-roundtrip").unwrap();
        connect(&dealer, "inproc://is-transport-test-roundtrip").unwrap();

        send_multipart(&dealer, vec![b"hello".to_vec(), b"world".to_vec()]).unwrap();

        let received = recv_multipart(&router).unwrap();
        // First frame from a ROUTER recv is the dealer's identity; drop it.
        assert_eq!(&received[1..], &[b"hello".to_vec(), b"world".to_vec()]);
    }
}
