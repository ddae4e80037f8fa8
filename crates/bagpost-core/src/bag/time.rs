use std::fmt;

/// Bag timestamp: whole seconds plus nanoseconds since the Unix epoch.
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosTime {
    pub sec: u32,
    pub nsec: u32,
}

impl RosTime {
    pub const fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            sec: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            nsec: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.sec.to_le_bytes());
        out[4..].copy_from_slice(&self.nsec.to_le_bytes());
        out
    }

    pub fn as_secs_f64(self) -> f64 {
        self.sec as f64 + self.nsec as f64 / 1e9
    }
}

impl fmt::Display for RosTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_chronological() {
        assert!(RosTime::new(10, 999_999_999) < RosTime::new(11, 0));
        assert!(RosTime::new(10, 1) > RosTime::new(10, 0));
    }

    #[test]
    fn test_byte_layout_is_little_endian_sec_then_nsec() {
        let t = RosTime::new(0x0102_0304, 5);
        assert_eq!(t.to_bytes(), [4, 3, 2, 1, 5, 0, 0, 0]);
        assert_eq!(RosTime::from_bytes(t.to_bytes()), t);
    }

    #[test]
    fn test_display() {
        assert_eq!(RosTime::new(3, 50).to_string(), "3.000000050");
    }
}
