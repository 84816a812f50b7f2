pub mod show;
pub mod show_manager;

use std::sync::Arc;

use parking_lot::RwLock;

/// The show database shared between the console and the output tick.
pub type SharedShow = Arc<RwLock<show::Show>>;
