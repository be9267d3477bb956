//! Pipeline stages: discovery, resolution, validation and the controller
//! that drives them.

pub mod controller;
pub mod discovery;
pub mod resolver;
pub mod stream_prober;
pub mod validator;

pub use controller::{RunController, RunReport};
pub use discovery::ChannelDiscoverer;
pub use resolver::StreamResolver;
pub use stream_prober::StreamProber;
pub use validator::{build_validator, StreamValidator};
