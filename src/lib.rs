//! # cifar-topk: Top-K Selection and CIFAR-10 Dataset Conversion
//!
//! Two small pieces of a training-data toolchain:
//!
//! - [`topk`]: select the K best entries of parallel key/value arrays, or the K
//!   best rows of an Arrow `RecordBatch`, in O(n log k)
//! - [`convert`]: turn CIFAR-10 binary record files into self-describing Parquet
//!   containers carrying image pixels and sparse one-hot labels
//!
//! ## Design Principles
//!
//! - **Deterministic ordering**: ties resolve by input position, NaN ranks last
//! - **Caller-owned randomness**: randomized selection takes an explicit RNG
//! - **Fail loudly**: malformed inputs are errors, never silent truncation
//!
//! ## Example Usage
//!
//! ```rust
//! use cifar_topk::topk::{select_top_k, SortOrder};
//!
//! let scores = [0.3, 0.9, 0.1, 0.9];
//! let labels = ["cat", "dog", "ship", "frog"];
//! let top = select_top_k(&scores, &labels, 2, SortOrder::Descending)?;
//!
//! assert_eq!(top.keys(), &[0.9, 0.9]);
//! assert_eq!(top.values(), &["dog", "frog"]);
//! # Ok::<(), cifar_topk::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cifar;
pub mod config;
pub mod container;
pub mod convert;
pub mod error;
pub mod fsutil;
pub mod metrics;
pub mod rng;
pub mod telemetry;
pub mod topk;

pub use error::{Error, Result};
