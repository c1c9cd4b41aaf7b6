use crate::spectrogram::image::Rgb;
use crate::spectrogram::params::ColorMap;

/// Map a normalised magnitude (0.0 - 1.0) to a colour
///
/// Out-of-range input is clamped first. Channel values truncate toward zero.
pub fn map_value(map: ColorMap, value: f32) -> Rgb {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };

    match map {
        ColorMap::Grayscale => {
            let g = channel(v * 255.0);
            Rgb::new(g, g, g)
        }
        ColorMap::Jet => jet(v),
        ColorMap::Hot => hot(v),
        ColorMap::Cool => Rgb::new(channel(v * 255.0), channel((1.0 - v) * 255.0), 255),
        ColorMap::Viridis => viridis(v),
    }
}

fn channel(x: f32) -> u8 {
    x.clamp(0.0, 255.0) as u8
}

// blue -> cyan -> green -> yellow -> red
fn jet(v: f32) -> Rgb {
    if v < 0.25 {
        let t = v / 0.25;
        Rgb::new(0, channel(t * 255.0), 255)
    } else if v < 0.5 {
        let t = (v - 0.25) / 0.25;
        Rgb::new(0, 255, channel((1.0 - t) * 255.0))
    } else if v < 0.75 {
        let t = (v - 0.5) / 0.25;
        Rgb::new(channel(t * 255.0), 255, 0)
    } else {
        let t = (v - 0.75) / 0.25;
        Rgb::new(255, channel((1.0 - t) * 255.0), 0)
    }
}

// black -> red -> yellow -> white
fn hot(v: f32) -> Rgb {
    if v < 0.33 {
        let t = v / 0.33;
        Rgb::new(channel(t * 255.0), 0, 0)
    } else if v < 0.66 {
        let t = (v - 0.33) / 0.33;
        Rgb::new(255, channel(t * 255.0), 0)
    } else {
        let t = (v - 0.66) / 0.34;
        Rgb::new(255, 255, channel(t * 255.0))
    }
}

fn viridis(v: f32) -> Rgb {
    if v < 0.5 {
        let t = v / 0.5;
        Rgb::new(
            channel(t * 68.0),
            channel(t * 1.0),
            channel(t * 84.0 + (1.0 - t) * 68.0),
        )
    } else {
        let t = (v - 0.5) / 0.5;
        Rgb::new(
            channel(t * 253.0 + (1.0 - t) * 68.0),
            channel(t * 231.0 + (1.0 - t) * 1.0),
            channel(t * 37.0 + (1.0 - t) * 84.0),
        )
    }
}
