use chrono::{DateTime, Utc};

/// Source of "now" for the recorder and query engine.
///
/// Production code uses the system clock; tests pin a fixed instant so that
/// retention boundaries and query windows are deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}
