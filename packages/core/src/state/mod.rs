pub mod room;

pub use room::{RoomId, RoomState, RoomTracker};
