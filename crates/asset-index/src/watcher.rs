//! Filesystem watching module.
//!
//! Watcher callbacks never touch the index. They classify `notify` events
//! into [`ChangeEvent`]s and send them through a crossbeam channel; the
//! library's event loop is the sole consumer and applies them through the
//! indexer.

mod events;

pub use events::{
    apply_change, classify_event, create_root_watcher, ChangeEvent, WatchId, WatchMessage,
};
