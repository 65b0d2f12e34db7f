//! Verbatim message relaying between two sockets (spec §4.4 "forward
//! verbatim in each direction"). Grounded on `isWorker.c`'s `isSupervisor`
//! loop, which does the identical recv-then-send dance in both directions
//! between its `router` and `dealer` sockets.

use is_domain::error::Result;
use is_transport::socket;

pub fn relay(from: &zmq::Socket, to: &zmq::Socket) -> Result<()> {
    let frames = socket::recv_multipart(from)?;
    socket::send_multipart(to, frames)
}
