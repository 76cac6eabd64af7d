use std::fmt;

pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

pub const DEFAULT_VOLUME: f32 = 0.2;
pub const DEFAULT_SPEED: f32 = 1.0;

/// A resolved, playable track. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    locator: String,
    title: String,
    is_local: bool,
}

impl TrackDescriptor {
    pub fn remote(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            is_local: false,
        }
    }

    pub fn local(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: path.into(),
            title: title.into(),
            is_local: true,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Volume and tempo applied by the transcoder when a stream is started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    volume: f32,
    speed: f32,
}

impl PlaybackSettings {
    /// Out-of-range values are clamped to the nearest bound.
    pub fn new(volume: f32, speed: f32) -> Self {
        Self {
            volume: clamp_volume(volume),
            speed: clamp_speed(speed),
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = clamp_speed(speed);
    }

    /// Applies whichever values are present, leaving the others untouched.
    pub fn apply(&mut self, volume: Option<f32>, speed: Option<f32>) {
        if let Some(volume) = volume {
            self.set_volume(volume);
        }
        if let Some(speed) = speed {
            self.set_speed(speed);
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            speed: DEFAULT_SPEED,
        }
    }
}

// NaN compares false against both bounds, so map it to the default instead
// of letting it reach the ffmpeg filter string.
fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return DEFAULT_VOLUME;
    }
    volume.clamp(MIN_VOLUME, MAX_VOLUME)
}

fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        return DEFAULT_SPEED;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}
