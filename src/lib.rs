pub mod config;
pub mod error;
pub mod format;
pub mod links;
pub mod model;
pub mod subscription;
pub mod synth;
pub mod wireguard;

pub use error::{EmptyResultError, ModelError};
pub use format::{FormatTag, classify};
pub use links::encode_link;
pub use model::{Assignment, InboundEndpoint, Snapshot, Subscriber};
pub use synth::{Rendered, SynthesisOptions, render};
