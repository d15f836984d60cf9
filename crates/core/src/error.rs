use thiserror::Error;

/// Failures from the OS capture / input / key-listener backends.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("input injection failed: {0}")]
    Input(String),
    #[error("key listener failed: {0}")]
    Listener(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Settings that cannot be turned into a usable engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed resolution '{0}', expected WIDTHxHEIGHT")]
    Resolution(String),
    #[error("no region set configured for resolution {0}")]
    MissingRegionSet(String),
    #[error("no agent layout configured for resolution {0}")]
    MissingLayout(String),
    #[error("region '{name}' is missing")]
    MissingRegion { name: String },
    #[error("region '{name}' has empty bounds {width}x{height}")]
    EmptyRegion { name: String, width: i32, height: i32 },
    #[error("region '{name}' at ({x}, {y}) size {width}x{height} does not fit the {screen_w}x{screen_h} screen")]
    OffScreen { name: String, x: i32, y: i32, width: i32, height: i32, screen_w: i32, screen_h: i32 },
    #[error("region '{name}' has malformed colour '{color}'")]
    Color { name: String, color: String },
    #[error("agent layout is invalid: {0}")]
    Layout(String),
    #[error("timing for {name} is invalid: {reason}")]
    Timing { name: String, reason: String },
    #[error("confirmation threshold '{0}' must be at least 1")]
    Threshold(&'static str),
    #[error("keybind '{name}': {source}")]
    Keybind {
        name: String,
        #[source]
        source: crate::keys::UnknownKey,
    },
}
