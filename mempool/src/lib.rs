//! Transactions waiting to be proposed.
//!
//! Every transaction is verified on a transient engine branch before it is
//! admitted, and again after each commit so that entries invalidated by the
//! committed batch are evicted.

mod config;
mod error;
mod mempool;

pub use {
    config::{MempoolConfig, DEFAULT_MAX_MEMPOOL_SIZE},
    error::MempoolError,
    mempool::{Mempool, MempoolEviction},
};
