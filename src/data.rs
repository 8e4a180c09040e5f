use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// GPU core busy percentage over the last sample period
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UtilizationSample {
    pub gpu: u32,
}

// Framebuffer memory, in bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemorySample {
    pub used: u64,
    pub total: u64,
}

impl MemorySample {
    pub fn used_mb(&self) -> f64 {
        self.used as f64 / BYTES_PER_MB
    }

    pub fn total_mb(&self) -> f64 {
        self.total as f64 / BYTES_PER_MB
    }

    /// `None` when the device reports no memory at all.
    pub fn used_percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.used as f64 / self.total as f64 * 100.0)
    }
}

/// One polling iteration. A `None` field means that query failed this time
/// round and is printed as `N/A`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    pub utilization: Option<UtilizationSample>,
    pub memory: Option<MemorySample>,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.utilization {
            Some(util) => write!(f, "[GPU Util: {}%", util.gpu)?,
            None => write!(f, "[GPU Util: N/A")?,
        }
        match self.memory {
            Some(mem) => {
                write!(
                    f,
                    " | Mem Used: {:.1}MB / {:.1}MB",
                    mem.used_mb(),
                    mem.total_mb()
                )?;
                match mem.used_percent() {
                    Some(pct) => write!(f, " ({:.1}%)]", pct),
                    None => write!(f, " (N/A)]"),
                }
            }
            None => write!(f, " | Mem Used: N/A]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn half_used_memory_is_fifty_percent() {
        let mem = MemorySample {
            used: 512 * MIB,
            total: 1024 * MIB,
        };
        assert_eq!(mem.used_mb(), 512.0);
        assert_eq!(mem.total_mb(), 1024.0);
        let pct = mem.used_percent().unwrap();
        assert!((pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let mem = MemorySample { used: 0, total: 0 };
        assert_eq!(mem.used_percent(), None);
    }

    #[test]
    fn full_reading_line() {
        let reading = Reading {
            utilization: Some(UtilizationSample { gpu: 37 }),
            memory: Some(MemorySample {
                used: 512 * MIB,
                total: 1024 * MIB,
            }),
        };
        assert_eq!(
            reading.to_string(),
            "[GPU Util: 37% | Mem Used: 512.0MB / 1024.0MB (50.0%)]"
        );
    }

    #[test]
    fn failed_queries_print_placeholders() {
        let reading = Reading::default();
        assert_eq!(reading.to_string(), "[GPU Util: N/A | Mem Used: N/A]");

        let reading = Reading {
            utilization: None,
            memory: Some(MemorySample { used: 0, total: 0 }),
        };
        assert_eq!(
            reading.to_string(),
            "[GPU Util: N/A | Mem Used: 0.0MB / 0.0MB (N/A)]"
        );
    }
}
