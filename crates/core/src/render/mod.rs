pub mod compositor;
pub mod engine;
pub mod fade;
pub mod snapshot;
pub mod state;
