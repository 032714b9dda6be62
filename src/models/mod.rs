pub mod alert;
pub mod lightcurve;
pub mod target;

// Re-export core models for easy access
pub use alert::Alert;
pub use lightcurve::{DetectionTag, Lightcurve, LightcurveRow};
pub use target::{BrokerData, Coordinates, TrackedObject};
