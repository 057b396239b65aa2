//! Header/Event wire layout: fixed-size, big-endian, written verbatim to trace files. §3, §6.

use fntrace_buffer::{Event, EventType};

/// Current on-disk layout version. Bump whenever [`Header`] or [`Event`]'s byte layout changes.
pub const TRACE_FORMAT_VERSION: u64 = 1;

pub const HEADER_SIZE_BYTES: usize = 56;
pub const EVENT_SIZE_BYTES: usize = 24;

/// The 56-byte record written once at the start of every trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u64,
    pub session_id: u64,
    pub process_id: i64,
    pub thread_id: u64,
    pub system_clock_timestamp_ns: i64,
    pub steady_clock_timestamp_ns: i64,
    pub event_count: i32,
}

impl Header {
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_SIZE_BYTES] {
        let mut bytes = [0u8; HEADER_SIZE_BYTES];
        bytes[0..8].copy_from_slice(&self.version.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.session_id.to_be_bytes());
        bytes[16..24].copy_from_slice(&self.process_id.to_be_bytes());
        bytes[24..32].copy_from_slice(&self.thread_id.to_be_bytes());
        bytes[32..40].copy_from_slice(&self.system_clock_timestamp_ns.to_be_bytes());
        bytes[40..48].copy_from_slice(&self.steady_clock_timestamp_ns.to_be_bytes());
        bytes[48..52].copy_from_slice(&self.event_count.to_be_bytes());
        // bytes[52..56] left zeroed: padding.
        bytes
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE_BYTES]) -> Self {
        Self {
            version: u64::from_be_bytes(bytes[0..8].try_into().unwrap()),
            session_id: u64::from_be_bytes(bytes[8..16].try_into().unwrap()),
            process_id: i64::from_be_bytes(bytes[16..24].try_into().unwrap()),
            thread_id: u64::from_be_bytes(bytes[24..32].try_into().unwrap()),
            system_clock_timestamp_ns: i64::from_be_bytes(bytes[32..40].try_into().unwrap()),
            steady_clock_timestamp_ns: i64::from_be_bytes(bytes[40..48].try_into().unwrap()),
            event_count: i32::from_be_bytes(bytes[48..52].try_into().unwrap()),
        }
    }

    /// The file name this header's trace file must use: `{session}-{thread}-{steady_ts}.trace`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{:016x}-{:016x}-{:016x}.trace",
            self.session_id, self.thread_id, self.steady_clock_timestamp_ns
        )
    }
}

const _: () = assert!(std::mem::size_of::<Header>() >= HEADER_SIZE_BYTES);

/// Serializes one [`Event`] to its 24-byte big-endian wire form.
#[must_use]
pub fn event_to_bytes(event: Event) -> [u8; EVENT_SIZE_BYTES] {
    let mut bytes = [0u8; EVENT_SIZE_BYTES];
    bytes[0..8].copy_from_slice(&event.steady_clock_timestamp_ns.to_be_bytes());
    bytes[8..16].copy_from_slice(&event.payload_1.to_be_bytes());
    bytes[16..20].copy_from_slice(&event.event_type.as_u32().to_be_bytes());
    bytes[20..24].copy_from_slice(&event.payload_2.to_be_bytes());
    bytes
}

/// Deserializes one [`Event`] from its 24-byte big-endian wire form. Returns `None` for an
/// unrecognized event type discriminant.
#[must_use]
pub fn event_from_bytes(bytes: &[u8; EVENT_SIZE_BYTES]) -> Option<Event> {
    let steady_clock_timestamp_ns = i64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let payload_1 = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    let event_type = EventType::from_u32(u32::from_be_bytes(bytes[16..20].try_into().unwrap()))?;
    let payload_2 = u32::from_be_bytes(bytes[20..24].try_into().unwrap());
    Some(Event::new(steady_clock_timestamp_ns, event_type, payload_1, payload_2))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario E: byte-exact header serialization.
    #[test]
    fn header_scenario_e_byte_exact() {
        let header = Header {
            version: 0,
            session_id: 1,
            process_id: 2,
            thread_id: 3,
            system_clock_timestamp_ns: 4,
            steady_clock_timestamp_ns: 5,
            event_count: 0,
        };
        let expected: [u8; 56] = [
            0, 0, 0, 0, 0, 0, 0, 0, // version
            0, 0, 0, 0, 0, 0, 0, 1, // session_id
            0, 0, 0, 0, 0, 0, 0, 2, // process_id
            0, 0, 0, 0, 0, 0, 0, 3, // thread_id
            0, 0, 0, 0, 0, 0, 0, 4, // system_clock_timestamp_ns
            0, 0, 0, 0, 0, 0, 0, 5, // steady_clock_timestamp_ns
            0, 0, 0, 0, // event_count
            0, 0, 0, 0, // padding
        ];
        assert_eq!(header.to_bytes(), expected);
        assert_eq!(Header::from_bytes(&expected), header);
    }

    #[test]
    fn event_round_trips_through_bytes() {
        let event = Event::new(42, EventType::FunctionExit, 7, 9);
        let bytes = event_to_bytes(event);
        assert_eq!(event_from_bytes(&bytes), Some(event));
    }

    #[test]
    fn event_from_bytes_rejects_unknown_type() {
        let mut bytes = event_to_bytes(Event::new(0, EventType::FunctionEntry, 0, 0));
        bytes[19] = 99; // low byte of the type field
        assert_eq!(event_from_bytes(&bytes), None);
    }

    #[test]
    fn header_file_name_matches_convention() {
        let header = Header {
            version: 1,
            session_id: 0xAB,
            process_id: 1,
            thread_id: 0xCD,
            system_clock_timestamp_ns: 0,
            steady_clock_timestamp_ns: 0xEF,
            event_count: 0,
        };
        assert_eq!(
            header.file_name(),
            format!("{:016x}-{:016x}-{:016x}.trace", 0xABu64, 0xCDu64, 0xEFu64)
        );
    }
}
