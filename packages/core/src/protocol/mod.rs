pub mod dispatcher;
pub mod envelope;
pub mod messages;
pub mod validation;
pub mod wire;

pub use dispatcher::{dispatch, Route};
pub use envelope::Envelope;
pub use messages::Message;
