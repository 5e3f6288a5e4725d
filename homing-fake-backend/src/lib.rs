//! In-memory stand-ins for the identity provider, document store, push subsystem and backend
//! endpoint, plus a generator of fake chatter.

mod backend;
mod chatter;
mod identity;
mod push;
mod store;

pub use backend::{RecordingAlerter, RecordingBackend};
pub use chatter::message_sender;
pub use identity::FakeIdentityProvider;
pub use push::FakePush;
pub use store::{MemoryStore, StoreWrite};
