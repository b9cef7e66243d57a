//! Simulated weather station
//!
//! Mimics a console that sends wind on every loop packet and the slower
//! sensors only on every other one, so downstream code sees partial packets.

use weex_core::{Timestamp, WeatherPacket};

pub struct Simulator {
    unit_system: i32,
    base_temp: f64,
    tick: u64,
}

impl Simulator {
    pub fn new(unit_system: i32) -> Self {
        Self {
            unit_system,
            base_temp: 20.0,
            tick: 0,
        }
    }

    /// Next loop packet stamped `now`
    pub fn next_packet(&mut self, now: Timestamp) -> WeatherPacket {
        self.tick += 1;
        // slow daily swing plus a faster wobble
        let day_phase = (now.rem_euclid(86_400) as f64 / 86_400.0) * std::f64::consts::TAU;
        let wobble = ((now % 97) as f64 / 97.0 * std::f64::consts::TAU).sin();

        let speed = (6.0 + 4.0 * wobble).max(0.0);
        let packet = WeatherPacket::new(now, Some(self.unit_system))
            .with("windSpeed", Some(speed))
            .with("windGust", Some(speed * 1.4))
            .with("windDir", (speed > 0.5).then(|| (200.0 + 60.0 * wobble).rem_euclid(360.0)));

        if self.tick % 2 == 1 {
            return packet;
        }
        let temp = self.base_temp - 5.0 * day_phase.cos() + 0.3 * wobble;
        packet
            .with("outTemp", Some(temp))
            .with("outHumidity", Some(65.0 - 10.0 * wobble))
            .with("barometer", Some(1013.25 + 2.0 * wobble))
            .with("rain", Some(0.0))
            .with("rainRate", Some(0.0))
            .with("UV", Some((3.0 * day_phase.sin()).max(0.0)))
    }
}
