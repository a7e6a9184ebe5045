pub mod external;
pub mod gemini_adapter;
pub mod host_native;
pub mod openai_adapter;
pub mod placeholder;
pub mod retry;
pub mod rotation;
pub mod router;
pub mod transport;
pub mod types;

pub use external::{ExternalStrategy, WireFormat};
pub use host_native::HostNativeStrategy;
pub use placeholder::PlaceholderStrategy;
pub use retry::RetryPolicy;
pub use rotation::Rotator;
pub use router::ProviderClient;
pub use transport::{HttpTransport, Transport, WireRequest, WireResponse};
pub use types::{
    Generation, GenerationStrategy, Message, Prompt, ProviderConfig, ProviderError, ProviderKind, Role,
};
