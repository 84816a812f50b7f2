pub mod module_manager;
pub mod output_module;
pub mod traits;

// Re-export for convenience
pub use module_manager::{ModuleError, ModuleManager};
pub use output_module::OutputModule;
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage, ModuleStatus};
