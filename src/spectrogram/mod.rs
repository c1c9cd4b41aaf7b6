pub mod colormap;
pub mod engine;
pub mod image;
pub mod params;
pub mod stft;
pub mod window;

pub use engine::{SpectrogramEngine, SpectrogramEvent};
pub use image::{Rgb, SpectrogramImage};
pub use params::{ColorMap, SpectrogramParameters, WindowKind};
