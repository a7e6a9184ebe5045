pub use crate::runtime::Runtime;
pub use crate::task::{GenerationRequest, TaskSnapshot, TaskStatus};

pub mod handlers;
pub mod server;

pub use server::{router, ApiServer};
