use crate::inventory::{ChainHop, Inventory};
use crate::model::{BarId, Color, LedMarker};
use log::debug;

/// Position of one LED: owning bar plus its bar-local index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedRef {
    pub bar: BarId,
    pub index: usize,
}

/// Authoritative flat view of every LED reachable from the power source, in
/// physical wire order. Decoupling the bar-local index from the wire-order
/// index is what lets bars be moved, rotated and re-chained while the live
/// stream keeps lighting the correct pixels.
#[derive(Debug, Default)]
pub struct Sequencer {
    ordered: Vec<LedRef>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ordered view from the registry's recorded chain. A bar
    /// entered through its end handle contributes its LEDs reversed, so the
    /// order always flows power source -> downstream. Each LED in the order
    /// is stamped with its wire-order index.
    pub fn rebuild(&mut self, inventory: &mut Inventory) {
        self.ordered.clear();
        let chain: Vec<ChainHop> = inventory.chain().to_vec();
        for hop in chain {
            let Some(bar) = inventory.bar_mut(hop.bar) else {
                continue;
            };
            let count = bar.leds.len();
            let locals: Vec<usize> = if hop.entered_at_start {
                (0..count).collect()
            } else {
                (0..count).rev().collect()
            };
            for local in locals {
                bar.leds[local].marker = LedMarker::Ordered(self.ordered.len());
                self.ordered.push(LedRef {
                    bar: hop.bar,
                    index: local,
                });
            }
        }
        debug!("sequencer rebuilt: {} LEDs in wire order", self.ordered.len());
    }

    /// Assign `colors[i]` to the i-th LED of the wire order. Colors beyond
    /// the order are ignored; a short frame leaves trailing LEDs untouched.
    pub fn apply_colors(&self, inventory: &mut Inventory, colors: &[Color]) {
        for (led_ref, &color) in self.ordered.iter().zip(colors) {
            if let Some(bar) = inventory.bar_mut(led_ref.bar) {
                if let Some(led) = bar.leds.get_mut(led_ref.index) {
                    led.color = color;
                }
            }
        }
    }

    pub fn ordered(&self) -> &[LedRef] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
