//! The worker thread's dispatch table (spec §4.4): parse the JSON request
//! once, route on `Operation`, and turn any `Result` into the appropriate
//! `Reply` shape. Grounded on `isWorker.c`'s `isWorker` dispatch loop, which
//! does the equivalent `strcasecmp`-chain over the `type` field.

use crate::connection_test::handle_connection_test;
use crate::context::OpsContext;
use crate::directory_stats::handle_directory_stats;
use crate::index::handle_index;
use crate::jpeg::{handle_blank, handle_jpeg, handle_spots};
use crate::metadata::handle_metadata;
use crate::transfer::handle_transfer;
use is_domain::request::{Operation, RequestFingerprint};
use is_proto::Reply;

/// Dispatch one parsed request, never propagating an error: failures become
/// an error reply, matching the one-part-error-string wire contract (spec
/// §6).
pub fn dispatch(ctx: &OpsContext, req: &RequestFingerprint, raw: &[u8], echoed_request: Vec<u8>) -> Reply {
    let result = match req.op {
        Operation::Jpeg => handle_jpeg(ctx, req, echoed_request),
        Operation::Blank => handle_blank(ctx, req, echoed_request),
        Operation::Spots => handle_spots(ctx, req, echoed_request),
        Operation::Metadata => handle_metadata(ctx, req, echoed_request),
        Operation::Index => handle_index(ctx, req, raw, echoed_request),
        Operation::Transfer => handle_transfer(ctx, req, raw, echoed_request),
        Operation::ConnectionTest => handle_connection_test(ctx, req, raw, echoed_request),
        Operation::DirectoryStats => handle_directory_stats(ctx, req, echoed_request),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, op = ?req.op, tag = %req.tag, "request failed");
            Reply::Error(e.to_string())
        }
    }
}
