use crate::format::ts::pes::PesPacket;
use crate::format::ts::types::*;
use log::debug;

// Period of the 33-bit PTS and of the PCR base, in milliseconds.
const CLOCK_WRAP_MS: u64 = PTS_DTS_SCALE * 1000 / PTS_HZ;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeSource {
    Undefined,
    Pts,
    Pcr,
}

/// Millisecond timestamps of the PES packets of one PID.
///
/// The first clock value is timestamp zero. The PTS of the PES packets is
/// used when present, otherwise the last PCR of the stream. Clock
/// wraparounds are absorbed so that timestamps never decrease.
#[derive(Debug, Clone)]
pub struct TimeStamper {
    source: TimeSource,
    first_clock: Option<u64>,
    previous_clock: u64,
    wrap_offset: u64,
    last_timestamp: u64,
}

impl Default for TimeStamper {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeStamper {
    pub fn new() -> Self {
        Self {
            source: TimeSource::Undefined,
            first_clock: None,
            previous_clock: 0,
            wrap_offset: 0,
            last_timestamp: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Updates the time reference with a PES packet of the PID.
    ///
    /// `last_pcr` is the last PCR of the stream, used when the PID carries
    /// no PTS.
    pub fn process_pes_packet(&mut self, packet: &PesPacket, last_pcr: Option<u64>) {
        if let Some(pts) = packet.pts() {
            if self.source != TimeSource::Pts {
                debug!("PID {:#06x}: timestamps from PTS", packet.source_pid());
                self.source = TimeSource::Pts;
            }
            self.process_clock(pts * 1000 / PTS_HZ);
        } else if self.source != TimeSource::Pts {
            if let Some(pcr) = last_pcr {
                self.source = TimeSource::Pcr;
                self.process_clock(pcr * 1000 / PCR_HZ);
            }
        }
    }

    /// Last timestamp in milliseconds.
    ///
    /// With a PCR time reference, `last_pcr` is taken into account first.
    pub fn last_timestamp(&mut self, last_pcr: Option<u64>) -> u64 {
        if self.source == TimeSource::Pcr {
            if let Some(pcr) = last_pcr {
                self.process_clock(pcr * 1000 / PCR_HZ);
            }
        }
        self.last_timestamp
    }

    fn process_clock(&mut self, clock: u64) {
        let Some(first) = self.first_clock else {
            self.first_clock = Some(clock);
            self.previous_clock = clock;
            return;
        };

        // A large backward jump is a wraparound, a small one is ignored.
        if clock < self.previous_clock && self.previous_clock - clock > CLOCK_WRAP_MS / 2 {
            self.wrap_offset += CLOCK_WRAP_MS;
        }
        self.previous_clock = clock;

        let timestamp = (clock + self.wrap_offset).saturating_sub(first);
        self.last_timestamp = self.last_timestamp.max(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pes_with_pts(pts: u64) -> PesPacket {
        let mut data = vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x08, 0x80, 0x80, 0x05, 0, 0, 0, 0, 0, 0x10];
        put_pts_dts(&mut data[9..14], pts);
        data[9] = (data[9] & 0x0F) | 0x21;
        PesPacket::from_bytes(data, 100).unwrap()
    }

    fn pes_without_pts() -> PesPacket {
        PesPacket::from_bytes(vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x04, 0x80, 0x00, 0x00, 0x10], 100).unwrap()
    }

    #[test]
    fn test_pts_timestamps() {
        let mut stamper = TimeStamper::new();
        stamper.process_pes_packet(&pes_with_pts(900_000), None);
        assert_eq!(stamper.last_timestamp(None), 0);
        stamper.process_pes_packet(&pes_with_pts(990_000), Some(0));
        assert_eq!(stamper.last_timestamp(Some(27_000_000_000)), 1000);
    }

    #[test]
    fn test_pts_wraparound() {
        let mut stamper = TimeStamper::new();
        stamper.process_pes_packet(&pes_with_pts(PTS_DTS_MASK - 90_000), None);
        stamper.process_pes_packet(&pes_with_pts(90_000), None);
        assert!((1999..=2001).contains(&stamper.last_timestamp(None)));
    }

    #[test]
    fn test_pcr_timestamps() {
        let mut stamper = TimeStamper::new();
        stamper.process_pes_packet(&pes_without_pts(), None);
        assert_eq!(stamper.last_timestamp(None), 0);
        stamper.process_pes_packet(&pes_without_pts(), Some(27_000_000));
        assert_eq!(stamper.last_timestamp(Some(81_000_000)), 2000);
    }
}
