pub mod color;
pub mod config;
pub mod editor;
pub mod error;
pub mod gc;
pub mod node_pool;
mod paged_store;
mod parallel;
pub mod spatial;
mod world;

pub use color::{Albedo, ColorPointer};
pub use config::{ColorPoolConfig, NodePoolConfig};
pub use error::VoxDagError;
pub use node_pool::NodePointer;
pub use paged_store::{Backend, InMemoryBackend, PageOp};
pub use world::VoxDag;
