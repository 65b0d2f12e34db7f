//! Cache key construction, per spec §3.
//!
//! Two flavors: a raw key identifying a fully decoded frame, and a reduced
//! key identifying a derived buffer. Grounded on `isData.c`'s key formatting
//! (`"%d:%s-%d"` for raw, with zoom/segment/output suffixes for reduced).

use crate::request::ReductionParams;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `"{gid}:{path}-{frame}"`
    pub fn raw(gid: u32, path: &str, frame: u32) -> Self {
        CacheKey(format!("{gid}:{path}-{frame}"))
    }

    /// `"{gid}:{path}-{frame}-{zoom}-{segcol}-{segrow}-{out_w}-{out_h}"`
    pub fn reduced(gid: u32, path: &str, frame: u32, r: &ReductionParams) -> Self {
        CacheKey(format!(
            "{gid}:{path}-{frame}-{:.1}-{:.0}-{:.0}-{}-{}",
            r.zoom, r.segcol, r.segrow, r.out_w, r.out_h
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_key_format() {
        let k = CacheKey::raw(1000, "/data/f.h5", 1);
        assert_eq!(k.as_str(), "1000:/data/f.h5-1");
    }

    #[test]
    fn reduced_key_includes_all_params() {
        let r = ReductionParams::normalized(2.0, 1.0, 0.0, 512, 512);
        let k = CacheKey::reduced(1000, "/data/f.h5", 3, &r);
        assert_eq!(k.as_str(), "1000:/data/f.h5-3-2.0-1-0-512-512");
    }

    #[test]
    fn distinct_reduction_params_collide_never() {
        let a = CacheKey::reduced(1, "/x", 1, &ReductionParams::normalized(1.0, 0.0, 0.0, 256, 256));
        let b = CacheKey::reduced(1, "/x", 1, &ReductionParams::normalized(2.0, 0.0, 0.0, 256, 256));
        assert_ne!(a, b);
    }
}
