pub mod events;
pub mod gateway;
pub mod messages;
pub mod model;
pub mod report;
pub mod service;
pub mod store;

pub use gateway::ClassroomGateway;
pub use messages::{ClientMessage, ServerMessage};
pub use report::Reporter;
pub use service::LifecycleService;
pub use store::{MemoryStore, Store};
