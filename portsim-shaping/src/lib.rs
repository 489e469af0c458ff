//! # portsim-shaping
//!
//! Everything that decides whether, when, or in which colour a packet may go
//! on before a scheduling discipline sees it.
//!
//! ### Key Submodules:
//! - `admission`: the [`AdmissionPolicy`] seam with unlimited and tail-drop buffers
//! - `red`: Random Early Detection over a smoothed occupancy average
//! - `token_bucket`: virtual-time token bucket and the shaper process built on it
//! - `trtcm`: RFC 2698 two-rate three-colour marker

pub mod admission;
pub mod red;
pub mod token_bucket;
pub mod trtcm;

pub use admission::{AdmissionPolicy, DropReason, QueueLimit, TailDrop, Unlimited, Verdict};
pub use red::{Red, RedParams};
pub use token_bucket::{TokenBucket, TokenBucketLimiter, TokenBucketShaper};
pub use trtcm::TrTcm;
