//! HLS acquisition engine.
//!
//! Takes a master or media playlist URL and produces a single merged
//! MPEG transport stream:
//!
//! 1. fetch the manifest and, for a master playlist, switch to the
//!    highest-bandwidth variant ([`playlist`]),
//! 2. fetch every media segment with a bounded worker pool, decrypting
//!    AES-128 segments on the fly ([`fetch`], [`key`], [`decrypt`]),
//! 3. concatenate the segment buffers in playlist order ([`merge`]).
//!
//! [`HlsDownloader`] wires the steps together. A single unrecoverable
//! segment does not abort the job; its slot in the output stays empty.

pub mod decrypt;
pub mod download;
pub mod error;
pub mod fetch;
pub mod key;
pub mod merge;
pub mod playlist;
pub mod util;

pub use download::HlsDownloader;
pub use error::{HinaError, HinaResult};
pub use merge::TransportStream;
pub use util::http::HttpClient;
