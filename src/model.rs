use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canvas-space scale: one physical meter of strip spans this many pixels.
pub const PIXELS_PER_METER: f32 = 100.0;
pub const DEFAULT_LEDS_PER_METER: u16 = 60;

/// Packed 0xRRGGBB color, the same shape the live stream delivers.
pub type Color = u32;

pub const START_HANDLE_TAG: Color = 0x0000FF;
pub const END_HANDLE_TAG: Color = 0xFF0000;
pub const POWER_HANDLE_TAG: Color = 0xFFFF00;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarId(pub u32);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u32);

impl HandleId {
    /// Reserved id of the power source's single handle. Never appears in a
    /// saved layout document, so loaded handle ids cannot collide with it.
    pub const POWER: HandleId = HandleId(u32::MAX);
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CableId(pub u64);

impl fmt::Display for BarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bar#{}", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == HandleId::POWER {
            write!(f, "handle#power")
        } else {
            write!(f, "handle#{}", self.0)
        }
    }
}

impl fmt::Display for CableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cable#{}", self.0)
    }
}

/// What a handle belongs to. Keeping this a tagged type (instead of a
/// sentinel bar id) means lookups cannot cross the bar/power id spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeId {
    PowerSource,
    Bar(BarId),
}

/// Identity of a single LED within the global order.
///
/// `Ordered` is the zero-based index in wire order, assigned on every chain
/// rebuild. `Scratch` is a random marker handed out when no chain exists, so
/// a stale index can never be mistaken for a live one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedMarker {
    Ordered(usize),
    Scratch(u64),
}

#[derive(Clone, Copy, Debug)]
pub struct Led {
    pub color: Color,
    pub marker: LedMarker,
}

#[derive(Clone, Debug)]
pub struct Handle {
    pub id: HandleId,
    pub owner: NodeId,
    pub pos: Vec2,
    pub is_start: bool,
    /// Presentation-only tint for the endpoint dot.
    pub color_tag: Color,
    /// The other handle of the same bar. `None` only for the power handle.
    pub sibling: Option<HandleId>,
    /// Symmetric wire link to a handle on a different bar (or the power source).
    pub linked: Option<HandleId>,
    /// Cable rendering the link, while pending or established.
    pub cable: Option<CableId>,
}

impl Handle {
    pub fn new(id: HandleId, owner: NodeId, pos: Vec2, color_tag: Color, is_start: bool) -> Self {
        Self {
            id,
            owner,
            pos,
            is_start,
            color_tag,
            sibling: None,
            linked: None,
            cable: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LedBar {
    pub id: BarId,
    pub start: HandleId,
    pub end: HandleId,
    pub leds_per_meter: u16,
    /// Index 0 is nearest the start handle.
    pub leds: Vec<Led>,
    /// Degrees, derived from the endpoints on every regenerate and cached so
    /// absolute-rotation edits have a reference value.
    pub rotation: f32,
}

impl LedBar {
    pub fn led_count(start: Vec2, end: Vec2, leds_per_meter: u16) -> usize {
        let meters = start.distance(end) / PIXELS_PER_METER;
        (meters * leds_per_meter as f32).floor() as usize
    }

    /// Rebuild the LED sequence from the current endpoint positions.
    ///
    /// Existing colors are kept by index when the count is unchanged;
    /// otherwise the whole sequence gets fresh random colors. Markers start
    /// as scratch values and only become meaningful on a chain rebuild.
    pub fn regenerate<R: Rng>(&mut self, start: Vec2, end: Vec2, rng: &mut R) {
        let count = Self::led_count(start, end, self.leds_per_meter);
        let delta = end - start;
        self.rotation = delta.y.atan2(delta.x).to_degrees();

        if self.leds.len() != count {
            self.leds = (0..count)
                .map(|_| Led {
                    color: random_color(rng),
                    marker: LedMarker::Scratch(rng.gen()),
                })
                .collect();
        }
    }
}

#[derive(Clone, Debug)]
pub struct PowerSource {
    pub pos: Vec2,
    pub handle: HandleId,
}

impl PowerSource {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            handle: HandleId::POWER,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Cable {
    pub id: CableId,
    pub start: HandleId,
    /// `None` while the cable is still being drawn.
    pub end: Option<HandleId>,
}

pub fn random_color<R: Rng>(rng: &mut R) -> Color {
    rng.gen_range(0..0x0100_0000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn led_count_is_floor_of_meters_times_density() {
        // 250 px = 2.5 m at 60 LEDs/m => floor(150.0) = 150
        let n = LedBar::led_count(vec2(0.0, 0.0), vec2(250.0, 0.0), 60);
        assert_eq!(n, 150);
        // 101 px = 1.01 m at 58 LEDs/m => floor(58.58) = 58
        let n = LedBar::led_count(vec2(0.0, 0.0), vec2(101.0, 0.0), 58);
        assert_eq!(n, 58);
    }

    #[test]
    fn regenerate_preserves_colors_when_count_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bar = LedBar {
            id: BarId(0),
            start: HandleId(0),
            end: HandleId(1),
            leds_per_meter: 60,
            leds: Vec::new(),
            rotation: 0.0,
        };
        bar.regenerate(vec2(0.0, 0.0), vec2(100.0, 0.0), &mut rng);
        assert_eq!(bar.leds.len(), 60);
        let before: Vec<Color> = bar.leds.iter().map(|l| l.color).collect();

        // Same length, different orientation: count unchanged, colors kept.
        bar.regenerate(vec2(0.0, 0.0), vec2(0.0, 100.0), &mut rng);
        let after: Vec<Color> = bar.leds.iter().map(|l| l.color).collect();
        assert_eq!(before, after);
        assert!((bar.rotation - 90.0).abs() < 1e-4);

        // Longer bar: count changes, sequence is rebuilt.
        bar.regenerate(vec2(0.0, 0.0), vec2(200.0, 0.0), &mut rng);
        assert_eq!(bar.leds.len(), 120);
    }

    #[test]
    fn power_handle_id_is_reserved() {
        let power = PowerSource::new(vec2(10.0, 10.0));
        assert_eq!(power.handle, HandleId::POWER);
        assert_ne!(power.handle, HandleId(0));
    }
}
