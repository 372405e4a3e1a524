//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through each chunk.
//!
//! # Example
//!
//! ```rust
//! use pdftik::{BatchProgressCallback, ConverterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, total: usize, pdf_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("item {}/{} done ({} bytes, {} so far)", index + 1, total, pdf_len, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch orchestrator as it converts each item.
///
/// Items inside one chunk run concurrently, so `on_item_start`,
/// `on_item_complete` and `on_item_error` may interleave in any order for
/// indices of the same chunk. Implementations must protect shared mutable
/// state (`Mutex`, atomics). All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first chunk is dispatched.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before the items of a chunk are dispatched.
    ///
    /// # Arguments
    /// * `chunk_index`: 0-indexed chunk number
    /// * `chunk_len`: number of items in this chunk
    fn on_chunk_start(&self, chunk_index: usize, chunk_len: usize) {
        let _ = (chunk_index, chunk_len);
    }

    /// Called just before an item is validated and staged.
    fn on_item_start(&self, index: usize, total_items: usize) {
        let _ = (index, total_items);
    }

    /// Called when an item converted successfully.
    ///
    /// # Arguments
    /// * `index`: 0-indexed position in the batch
    /// * `pdf_len`: byte length of the produced buffer
    fn on_item_complete(&self, index: usize, total_items: usize, pdf_len: usize) {
        let _ = (index, total_items, pdf_len);
    }

    /// Called when an item failed. The batch will fail after its chunk settles.
    fn on_item_error(&self, index: usize, total_items: usize, error: &str) {
        let _ = (index, total_items, error);
    }

    /// Called once when the batch returns, successfully or not.
    ///
    /// # Arguments
    /// * `success_count`: PDFs handed back to the caller; `0` when the batch
    ///   failed, since a failed batch returns no partial results
    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        let _ = (total_items, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
