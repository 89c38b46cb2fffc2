pub mod display;

pub use display::{DisplaySink, DisplayState, MemoryDisplay, Panel};
