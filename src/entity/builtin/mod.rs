//! Built-in entities: a VM host and a recording sink.

pub mod host;
pub mod recorder;

pub use host::Host;
pub use recorder::Recorder;
