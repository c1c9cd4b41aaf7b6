pub mod callback;
pub mod decode;
pub mod device;
pub mod engine;
pub mod notifier;
pub mod output;
pub mod state;

pub use decode::load_wav_file;
pub use engine::PlaybackEngine;
pub use notifier::PlaybackEvent;
pub use output::{AudioOutput, CpalOutput, ManualDriver, ManualOutput};
pub use state::PlaybackState;
