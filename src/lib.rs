//! Shroud - self-decrypting payload bundles
//!
//! Turns an arbitrary payload into a bundle that can reconstruct and hand the
//! payload to an executor. Protection scatters the payload over decoy
//! containers, cuts the result into fragments along several independent
//! partitions, and pushes every fragment through a stack of keyed layers.
//! Recovery tolerates partial corruption: any single intact partition is
//! enough, and when nothing is, it degrades quietly instead of failing.
//!
//! ## Protection Pipeline
//!
//! ```text
//! Payload → Embed → Fragment (per partition) → Tag → Layer Stack → Envelope → Bundle
//! ```
//!
//! - **Embed**: payload slices scattered over five categories of decoy containers
//! - **Fragment**: the serialized index cut into `8, 4, ...` slices per partition
//! - **Tag**: every slice stamped with a SHA3-512 tag and protection-time marker
//! - **Layer Stack**: per (partition, layer) keyed encryption plus camouflage
//! - **Envelope**: the partition table compressed and wrapped under the master key
//!
//! ## Example
//!
//! ```no_run
//! use shroud::config::ShroudConfig;
//! use shroud::executor::CaptureExecutor;
//! use shroud::protect::protect;
//! use shroud::supervisor::{execute_bundle, RecoveryOutcome};
//!
//! let bundle = protect(b"print('hello')", "pw123", &ShroudConfig::default()).unwrap();
//! let bytes = bundle.to_bytes().unwrap();
//!
//! let mut executor = CaptureExecutor::new();
//! let report = execute_bundle(&bytes, &mut executor);
//! assert_eq!(report.outcome, RecoveryOutcome::Executed);
//! ```

pub mod bundle;
pub mod cli;
pub mod clock;
pub mod config;
pub mod embed;
pub mod error;
pub mod executor;
pub mod keys;
pub mod pipeline;
pub mod protect;
pub mod reassemble;
pub mod supervisor;
pub mod validate;

pub use bundle::{read_bundle_file, write_bundle_file, Bundle, BundleHeader};
pub use config::ShroudConfig;
pub use error::{Result, ShroudError};
pub use protect::protect;
pub use supervisor::{execute_bundle, RecoveryOutcome, RecoveryReport};
