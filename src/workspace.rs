use crate::inventory::{Inventory, TopologyError};
use crate::layout::{self, BarRecord, LayoutError};
use crate::model::{
    BarId, CableId, Color, Handle, HandleId, NodeId, PowerSource, POWER_HANDLE_TAG,
};
use crate::sequencer::Sequencer;
use glam::Vec2;
use log::{debug, info, warn};
use rand::thread_rng;

/// The topology context a session runs against: one power source, one
/// inventory of bars/handles/cables, one ordered LED view.
///
/// Every mutation enters through here and runs to completion, including any
/// cascaded chain rebuild, before the next one. A preemptive caller (e.g. a
/// stream thread plus a renderer) must treat the whole workspace as one
/// atomic unit behind a mutex.
pub struct Workspace {
    inventory: Inventory,
    sequencer: Sequencer,
    power: PowerSource,
}

impl Workspace {
    pub fn new(power_pos: Vec2) -> Self {
        let mut inventory = Inventory::new();
        let power = PowerSource::new(power_pos);
        inventory.register_handle(Handle::new(
            power.handle,
            NodeId::PowerSource,
            power_pos,
            POWER_HANDLE_TAG,
            true,
        ));
        info!("workspace created, power source at {:?}", power_pos);
        Self {
            inventory,
            sequencer: Sequencer::new(),
            power,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn power_handle(&self) -> HandleId {
        self.power.handle
    }

    pub fn add_bar(&mut self, start: Vec2, end: Vec2, leds_per_meter: u16) -> BarId {
        self.inventory
            .create_bar(start, end, leds_per_meter, None, &mut thread_rng())
    }

    pub fn delete_bar(&mut self, id: BarId) -> Result<(), TopologyError> {
        self.inventory.delete_bar(id)?;
        self.on_topology_changed()
    }

    pub fn move_handle(&mut self, id: HandleId, pos: Vec2) -> Result<(), TopologyError> {
        self.inventory.move_handle(id, pos, &mut thread_rng())?;
        self.on_topology_changed()
    }

    pub fn move_bar(&mut self, id: BarId, delta: Vec2) -> Result<(), TopologyError> {
        self.inventory.translate_bar(id, delta, &mut thread_rng())?;
        self.on_topology_changed()
    }

    pub fn rotate_bar(&mut self, id: BarId, degrees: f32) -> Result<(), TopologyError> {
        self.inventory.rotate_bar(id, degrees, &mut thread_rng())?;
        self.on_topology_changed()
    }

    /// Set an absolute rotation: undo the cached angle, then apply the new
    /// one.
    pub fn set_rotation(&mut self, id: BarId, degrees: f32) -> Result<(), TopologyError> {
        let current = self
            .inventory
            .bar(id)
            .ok_or(TopologyError::UnknownBar(id))?
            .rotation;
        self.rotate_bar(id, degrees - current)
    }

    pub fn set_leds_per_meter(&mut self, id: BarId, lpm: u16) -> Result<(), TopologyError> {
        self.inventory.set_leds_per_meter(id, lpm, &mut thread_rng())?;
        self.on_topology_changed()
    }

    /// Start drawing a cable from a handle. Returns `None` when the handle is
    /// unknown or already carries a cable.
    pub fn begin_cable(&mut self, from: HandleId) -> Option<CableId> {
        let handle = self.inventory.handle(from)?;
        if handle.cable.is_some() {
            return None;
        }
        let id = self.inventory.register_cable(from);
        if let Some(handle) = self.inventory.handle_mut(from) {
            handle.cable = Some(id);
        }
        Some(id)
    }

    /// Try to finalize a pending cable onto `target`.
    ///
    /// The link is established only when the target exists, sits on a
    /// different bar (or the power source), and neither end is already
    /// linked. Anything else silently discards the cable and clears the
    /// source handle's pending reference; `Ok(false)` is the only trace.
    pub fn complete_cable(
        &mut self,
        cable: CableId,
        target: Option<HandleId>,
    ) -> Result<bool, TopologyError> {
        let Some(source) = self.inventory.cable(cable).map(|c| c.start) else {
            return Ok(false);
        };
        let accepted = target.filter(|&tid| {
            if tid == source {
                return false;
            }
            match (self.inventory.handle(source), self.inventory.handle(tid)) {
                (Some(src), Some(tgt)) => {
                    src.owner != tgt.owner && src.linked.is_none() && tgt.linked.is_none()
                }
                _ => false,
            }
        });

        match accepted {
            Some(tid) => {
                if let Some(c) = self.inventory.cable_mut(cable) {
                    c.end = Some(tid);
                }
                if let Some(src) = self.inventory.handle_mut(source) {
                    src.linked = Some(tid);
                    src.cable = Some(cable);
                }
                if let Some(tgt) = self.inventory.handle_mut(tid) {
                    tgt.linked = Some(source);
                    tgt.cable = Some(cable);
                }
                debug!("linked {} -> {}", source, tid);
                self.on_topology_changed()?;
                Ok(true)
            }
            None => {
                self.inventory.delete_cable(cable);
                if let Some(src) = self.inventory.handle_mut(source) {
                    src.cable = None;
                }
                warn!("link attempt from {} rejected, cable discarded", source);
                Ok(false)
            }
        }
    }

    /// Convenience: draw and finalize a cable in one step.
    pub fn connect(&mut self, from: HandleId, to: HandleId) -> Result<bool, TopologyError> {
        match self.begin_cable(from) {
            Some(cable) => self.complete_cable(cable, Some(to)),
            None => Ok(false),
        }
    }

    /// Remove a cable. An established link is severed on both ends and the
    /// chain re-linearized; a pending cable just vanishes.
    pub fn remove_cable(&mut self, id: CableId) -> Result<(), TopologyError> {
        let Some(cable) = self.inventory.delete_cable(id) else {
            return Ok(());
        };
        match cable.end {
            Some(end) => {
                for hid in [cable.start, end] {
                    if let Some(handle) = self.inventory.handle_mut(hid) {
                        handle.linked = None;
                        handle.cable = None;
                    }
                }
                debug!("unlinked {} -/- {}", cable.start, end);
                self.on_topology_changed()
            }
            None => {
                if let Some(handle) = self.inventory.handle_mut(cable.start) {
                    handle.cable = None;
                }
                Ok(())
            }
        }
    }

    /// The single deterministic rebuild entry point.
    ///
    /// Power linked: re-walk the chain and resequence. Unlinked: no chain
    /// exists, so every LED gets a fresh scratch marker and the ordered view
    /// empties. A cycle aborts before anything is committed.
    pub fn on_topology_changed(&mut self) -> Result<(), TopologyError> {
        let linked = self
            .inventory
            .handle(self.power.handle)
            .and_then(|h| h.linked);
        match linked {
            Some(first) => {
                let hops = self.inventory.walk_chain(first)?;
                self.inventory.commit_chain(hops);
            }
            None => {
                self.inventory.clear_chain();
                self.inventory.scratch_led_markers(&mut thread_rng());
            }
        }
        self.sequencer.rebuild(&mut self.inventory);
        Ok(())
    }

    /// Apply one decoded frame of wire-ordered colors.
    pub fn apply_frame(&mut self, colors: &[Color]) {
        self.sequencer.apply_colors(&mut self.inventory, colors);
    }

    pub fn save_layout(&self) -> Vec<BarRecord> {
        layout::save(&self.inventory)
    }

    /// Replace the topology with a saved document. Fails before touching any
    /// live state; on success the power source is fresh and unlinked and the
    /// sequencer is NOT rebuilt — trigger `on_topology_changed` once wiring
    /// to the power source is re-established, the same way edits do.
    pub fn load_layout(&mut self, records: &[BarRecord]) -> Result<(), LayoutError> {
        let mut inventory = layout::load(records)?;
        inventory.register_handle(Handle::new(
            self.power.handle,
            NodeId::PowerSource,
            self.power.pos,
            POWER_HANDLE_TAG,
            true,
        ));
        info!("layout loaded: {} bars", inventory.bar_count());
        self.inventory = inventory;
        Ok(())
    }
}
