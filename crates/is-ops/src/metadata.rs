//! `metadata` dispatch (spec §4.4): decode metadata without touching pixel
//! data. Grounded on `isData.c`'s metadata-only accessors.

use crate::context::OpsContext;
use is_domain::error::Result;
use is_domain::request::RequestFingerprint;
use is_proto::Reply;

pub fn handle_metadata(ctx: &OpsContext, req: &RequestFingerprint, echoed_request: Vec<u8>) -> Result<Reply> {
    let metadata = ctx.cache.get_metadata(&req.path)?;
    Ok(Reply::Metadata {
        echoed_request,
        metadata: serde_json::to_vec(&metadata).unwrap_or_default(),
    })
}
