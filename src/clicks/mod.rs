pub mod recorder;

pub use recorder::{ClickRecorder, ClickRequest};
