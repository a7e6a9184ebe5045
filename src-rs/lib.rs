pub mod config;
pub mod helpers;
pub mod host;
pub mod runtime;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "storage/lib.rs"]
pub mod storage;
#[path = "notify/lib.rs"]
pub mod notify;
#[path = "task/lib.rs"]
pub mod task;
#[path = "api/lib.rs"]
pub mod api;

pub use config::AppConfig;
pub use runtime::Runtime;
