//! Per-backend repodata format codecs. Each module turns a backend's
//! native wire format into `Vec<`[`crate::types::OsPackage`]`>`; decompression
//! (gzip for all three, the extra tar layer for APK) is the caller's job so
//! these stay pure parsers.

pub mod apkindex;
pub mod packages;
pub mod repomd;
