//! File watching for `kiln dev`.

pub mod watcher;

pub use watcher::FileWatcher;
