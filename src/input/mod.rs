pub mod events;

pub use events::{event_channel, EventReceiver, EventSender, MapEvent};
