/// Event type discriminant: function entry or exit.
///
/// Wire value `1` for entry, `2` for exit (see `fntrace_runtime::trace` for the on-disk codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    FunctionEntry,
    FunctionExit,
}

impl EventType {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::FunctionEntry => 1,
            Self::FunctionExit => 2,
        }
    }

    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::FunctionEntry),
            2 => Some(Self::FunctionExit),
            _ => None,
        }
    }
}

/// A single function-call event: the fixed 24-byte record the whole system moves around.
///
/// `payload_1` carries the function identifier for entry/exit events; `payload_2` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub steady_clock_timestamp_ns: i64,
    pub payload_1: u64,
    pub event_type: EventType,
    pub payload_2: u32,
}

impl Event {
    #[must_use]
    pub const fn new(
        steady_clock_timestamp_ns: i64,
        event_type: EventType,
        payload_1: u64,
        payload_2: u32,
    ) -> Self {
        Self {
            steady_clock_timestamp_ns,
            payload_1,
            event_type,
            payload_2,
        }
    }
}

/// Placeholder value used to fill freshly allocated slices before any event is pushed.
///
/// Never observed by readers: `size`/`ContiguousMemoryChunks` only expose slots that have
/// actually been written.
pub const EMPTY_EVENT: Event = Event {
    steady_clock_timestamp_ns: 0,
    payload_1: 0,
    event_type: EventType::FunctionEntry,
    payload_2: 0,
};
