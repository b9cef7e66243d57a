//! Registry of the observations the real-time engine accumulates

/// Kind of running accumulator kept for an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorKind {
    Scalar,
    Vector,
}

/// Static description of one accumulated observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationDescriptor {
    /// Name the accumulator is reported under
    pub name: &'static str,
    /// Packet field the magnitude is read from
    pub source: &'static str,
    /// Packet field the bearing is read from (vector observations only)
    pub direction: Option<&'static str>,
    pub kind: AccumulatorKind,
    /// Whether a trailing-window series is kept alongside the accumulator
    pub short_window: bool,
}

impl ObservationDescriptor {
    const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            source: name,
            direction: None,
            kind: AccumulatorKind::Scalar,
            short_window: false,
        }
    }

    const fn windowed(name: &'static str) -> Self {
        Self {
            short_window: true,
            ..Self::scalar(name)
        }
    }

    pub fn is_vector(&self) -> bool {
        self.kind == AccumulatorKind::Vector
    }
}

/// Name of the synthetic vector observation built from windSpeed/windDir
pub const WIND: &str = "wind";

/// Observations buffered by the engine
pub const REGISTRY: &[ObservationDescriptor] = &[
    ObservationDescriptor::scalar("outTemp"),
    ObservationDescriptor::scalar("barometer"),
    ObservationDescriptor::scalar("outHumidity"),
    ObservationDescriptor::scalar("rain"),
    ObservationDescriptor::scalar("rainRate"),
    ObservationDescriptor::scalar("humidex"),
    ObservationDescriptor::scalar("windchill"),
    ObservationDescriptor::scalar("heatindex"),
    ObservationDescriptor::windowed("windSpeed"),
    ObservationDescriptor::scalar("inTemp"),
    ObservationDescriptor::scalar("appTemp"),
    ObservationDescriptor::scalar("dewpoint"),
    ObservationDescriptor::scalar("windDir"),
    ObservationDescriptor::scalar("UV"),
    ObservationDescriptor::scalar("radiation"),
    ObservationDescriptor::windowed("windGust"),
    ObservationDescriptor::scalar("windGustDir"),
    ObservationDescriptor {
        name: WIND,
        source: "windSpeed",
        direction: Some("windDir"),
        kind: AccumulatorKind::Vector,
        short_window: true,
    },
];

/// Look up a descriptor by reported name
pub fn descriptor(name: &str) -> Option<&'static ObservationDescriptor> {
    REGISTRY.iter().find(|d| d.name == name)
}
