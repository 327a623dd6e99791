use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable facts. They are published to observers after they
/// have been applied to the aggregate that emitted them.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "garage.tank.fuel_added").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (wall-clock time on the device).
    fn occurred_at(&self) -> DateTime<Utc>;
}
