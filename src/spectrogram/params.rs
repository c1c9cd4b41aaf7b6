use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{SpectrogramError, SpectrogramResult};
use crate::types::MAX_ANALYSIS_SECONDS;

/// Analysis window applied to each frame before the transform
///
/// Deserialized through [`WindowKind::from_name`], so config files accept any
/// case and unknown names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum WindowKind {
    Rectangular,
    #[default]
    Hamming,
    Hanning,
    Blackman,
}

impl WindowKind {
    /// Parse a window name; anything unrecognised applies no window
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "hamming" => WindowKind::Hamming,
            "hanning" | "hann" => WindowKind::Hanning,
            "blackman" => WindowKind::Blackman,
            _ => WindowKind::Rectangular,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Rectangular => "Rectangular",
            WindowKind::Hamming => "Hamming",
            WindowKind::Hanning => "Hanning",
            WindowKind::Blackman => "Blackman",
        }
    }
}

impl From<String> for WindowKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitude to colour mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ColorMap {
    #[default]
    Grayscale,
    Jet,
    Hot,
    Cool,
    Viridis,
}

impl ColorMap {
    /// Parse a colour map name; anything unrecognised is Grayscale
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jet" => ColorMap::Jet,
            "hot" => ColorMap::Hot,
            "cool" => ColorMap::Cool,
            "viridis" => ColorMap::Viridis,
            _ => ColorMap::Grayscale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMap::Grayscale => "Grayscale",
            ColorMap::Jet => "Jet",
            ColorMap::Hot => "Hot",
            ColorMap::Cool => "Cool",
            ColorMap::Viridis => "Viridis",
        }
    }
}

impl From<String> for ColorMap {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl fmt::Display for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full parameter set for one spectrogram computation
///
/// Times are in seconds, frequencies in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParameters {
    /// Hop between successive analysis frames
    pub time_step: f64,

    /// Length of each analysis frame
    pub time_window: f64,

    /// Minimum transform size; rounded up to a power of two covering the window
    pub fft_size: Option<usize>,

    pub window: WindowKind,

    /// Lowest displayed frequency
    pub min_frequency: f64,

    /// Highest displayed frequency; also drives the downsample pre-pass
    pub max_frequency: f64,

    /// dB span below the peak mapped onto the colour scale
    pub dynamic_range: f64,

    pub color_map: ColorMap,

    pub pre_emphasis: bool,
    pub pre_emphasis_factor: f64,

    /// Upper bound on the analysed duration
    pub max_duration: f64,

    /// Start of the analysed range
    pub start_time: f64,

    /// Requested length of the analysed range (0 = up to `max_duration`)
    pub window_duration: f64,
}

impl Default for SpectrogramParameters {
    fn default() -> Self {
        Self {
            time_step: 0.005,
            time_window: 0.025,
            fft_size: None,
            window: WindowKind::Hamming,
            min_frequency: 0.0,
            max_frequency: 8000.0,
            dynamic_range: 70.0,
            color_map: ColorMap::Grayscale,
            pre_emphasis: false,
            pre_emphasis_factor: 0.97,
            max_duration: MAX_ANALYSIS_SECONDS,
            start_time: 0.0,
            window_duration: 0.0,
        }
    }
}

impl SpectrogramParameters {
    /// Same parameters over a different time range
    pub fn with_range(&self, start_time: f64, window_duration: f64) -> Self {
        Self {
            start_time,
            window_duration,
            ..self.clone()
        }
    }

    /// Reject values no computation can use
    ///
    /// Window and hop sizes that round to zero samples are caught later, once
    /// the sample rate is known.
    pub fn validate(&self) -> SpectrogramResult<()> {
        let invalid = |msg: String| Err(SpectrogramError::InvalidParameters(msg));

        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return invalid(format!("time step must be positive (got {})", self.time_step));
        }
        if !(self.time_window.is_finite() && self.time_window > 0.0) {
            return invalid(format!("time window must be positive (got {})", self.time_window));
        }
        if let Some(size) = self.fft_size {
            if size == 0 {
                return invalid("FFT size must be positive".to_string());
            }
        }
        if !(self.min_frequency.is_finite() && self.min_frequency >= 0.0) {
            return invalid(format!(
                "minimum frequency must be >= 0 (got {})",
                self.min_frequency
            ));
        }
        if !(self.max_frequency.is_finite() && self.max_frequency > self.min_frequency) {
            return invalid(format!(
                "maximum frequency {} must exceed minimum frequency {}",
                self.max_frequency, self.min_frequency
            ));
        }
        if !(self.dynamic_range.is_finite() && self.dynamic_range > 0.0) {
            return invalid(format!(
                "dynamic range must be positive (got {})",
                self.dynamic_range
            ));
        }
        if !self.pre_emphasis_factor.is_finite() {
            return invalid("pre-emphasis factor must be finite".to_string());
        }
        if !(self.max_duration.is_finite()
            && self.max_duration > 0.0
            && self.max_duration <= MAX_ANALYSIS_SECONDS)
        {
            return invalid(format!(
                "max duration must be within (0, {}] seconds (got {})",
                MAX_ANALYSIS_SECONDS, self.max_duration
            ));
        }
        if !(self.start_time.is_finite() && self.start_time >= 0.0) {
            return invalid(format!("start time must be >= 0 (got {})", self.start_time));
        }
        if !(self.window_duration.is_finite() && self.window_duration >= 0.0) {
            return invalid(format!(
                "window duration must be >= 0 (got {})",
                self.window_duration
            ));
        }

        Ok(())
    }

    /// Hash over every field, used to key the result cache
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.time_step.to_bits().hash(&mut hasher);
        self.time_window.to_bits().hash(&mut hasher);
        self.fft_size.hash(&mut hasher);
        self.window.hash(&mut hasher);
        self.min_frequency.to_bits().hash(&mut hasher);
        self.max_frequency.to_bits().hash(&mut hasher);
        self.dynamic_range.to_bits().hash(&mut hasher);
        self.color_map.hash(&mut hasher);
        self.pre_emphasis.hash(&mut hasher);
        self.pre_emphasis_factor.to_bits().hash(&mut hasher);
        self.max_duration.to_bits().hash(&mut hasher);
        self.start_time.to_bits().hash(&mut hasher);
        self.window_duration.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}
