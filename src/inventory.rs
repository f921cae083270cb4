use crate::model::{
    BarId, Cable, CableId, Handle, HandleId, LedBar, LedMarker, NodeId, END_HANDLE_TAG,
    START_HANDLE_TAG,
};
use glam::Vec2;
use log::debug;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("unknown {0}")]
    UnknownBar(BarId),
    #[error("unknown {0}")]
    UnknownHandle(HandleId),
    #[error("{0} is still linked; remove its cable first")]
    StillLinked(BarId),
    #[error("the power source handle cannot be moved")]
    ImmovableHandle,
    #[error("topology cycle detected at {0}")]
    CycleDetected(BarId),
}

/// One step of the discovered chain: which bar was reached, and whether it
/// was entered through its start handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainHop {
    pub bar: BarId,
    pub entered_at_start: bool,
}

/// Single source of truth for all live bars, handles and cables.
///
/// Ids come from strictly monotonic counters that are never derived from the
/// current collection sizes, so deleting entities can never make an id
/// collide with a later allocation.
#[derive(Debug, Default)]
pub struct Inventory {
    bars: BTreeMap<BarId, LedBar>,
    handles: BTreeMap<HandleId, Handle>,
    cables: BTreeMap<CableId, Cable>,
    chain: Vec<ChainHop>,
    next_bar_id: u32,
    next_handle_id: u32,
    next_cable_id: u64,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handle(&mut self, handle: Handle) {
        if handle.id != HandleId::POWER {
            self.next_handle_id = self.next_handle_id.max(handle.id.0 + 1);
        }
        self.handles.insert(handle.id, handle);
    }

    /// Create a bar between two coordinates, allocating the bar id and a
    /// sibling pair of handles. `explicit_id` is the load path; fresh ids
    /// are allocated around it so later allocations stay collision-free.
    pub fn create_bar<R: Rng>(
        &mut self,
        start_pos: Vec2,
        end_pos: Vec2,
        leds_per_meter: u16,
        explicit_id: Option<BarId>,
        rng: &mut R,
    ) -> BarId {
        let bar_id = match explicit_id {
            Some(id) => {
                self.next_bar_id = self.next_bar_id.max(id.0 + 1);
                id
            }
            None => self.alloc_bar_id(),
        };
        let start_id = self.alloc_handle_id();
        let end_id = self.alloc_handle_id();

        let mut start = Handle::new(start_id, NodeId::Bar(bar_id), start_pos, START_HANDLE_TAG, true);
        let mut end = Handle::new(end_id, NodeId::Bar(bar_id), end_pos, END_HANDLE_TAG, false);
        start.sibling = Some(end_id);
        end.sibling = Some(start_id);

        let mut bar = LedBar {
            id: bar_id,
            start: start_id,
            end: end_id,
            leds_per_meter,
            leds: Vec::new(),
            rotation: 0.0,
        };
        bar.regenerate(start_pos, end_pos, rng);
        debug!(
            "created {} ({} LEDs) between {:?} and {:?}",
            bar_id,
            bar.leds.len(),
            start_pos,
            end_pos
        );

        self.register_handle(start);
        self.register_handle(end);
        self.bars.insert(bar_id, bar);
        bar_id
    }

    /// Insert a bar whose parts were rebuilt from a saved document. All ids
    /// are final; the allocators are bumped past them.
    pub fn register_loaded_bar(&mut self, bar: LedBar, start: Handle, end: Handle) {
        self.next_bar_id = self.next_bar_id.max(bar.id.0 + 1);
        self.register_handle(start);
        self.register_handle(end);
        self.bars.insert(bar.id, bar);
    }

    /// Delete a bar and release both of its handles. A bar that is still
    /// wired (either handle linked or carrying a cable) is rejected; the
    /// caller must remove its cables first.
    pub fn delete_bar(&mut self, id: BarId) -> Result<(), TopologyError> {
        let bar = self.bars.get(&id).ok_or(TopologyError::UnknownBar(id))?;
        for hid in [bar.start, bar.end] {
            let handle = self
                .handles
                .get(&hid)
                .ok_or(TopologyError::UnknownHandle(hid))?;
            if handle.linked.is_some() || handle.cable.is_some() {
                return Err(TopologyError::StillLinked(id));
            }
        }
        let bar = self.bars.remove(&id).ok_or(TopologyError::UnknownBar(id))?;
        self.handles.remove(&bar.start);
        self.handles.remove(&bar.end);
        debug!("deleted {}", id);
        Ok(())
    }

    pub fn register_cable(&mut self, start: HandleId) -> CableId {
        let id = CableId(self.next_cable_id);
        self.next_cable_id += 1;
        self.cables.insert(id, Cable { id, start, end: None });
        id
    }

    /// Load path: insert a cable under its saved id.
    pub fn register_loaded_cable(&mut self, cable: Cable) {
        self.next_cable_id = self.next_cable_id.max(cable.id.0 + 1);
        self.cables.insert(cable.id, cable);
    }

    pub fn delete_cable(&mut self, id: CableId) -> Option<Cable> {
        self.cables.remove(&id)
    }

    pub fn bar(&self, id: BarId) -> Option<&LedBar> {
        self.bars.get(&id)
    }

    pub fn bar_mut(&mut self, id: BarId) -> Option<&mut LedBar> {
        self.bars.get_mut(&id)
    }

    pub fn handle(&self, id: HandleId) -> Option<&Handle> {
        self.handles.get(&id)
    }

    pub fn handle_mut(&mut self, id: HandleId) -> Option<&mut Handle> {
        self.handles.get_mut(&id)
    }

    pub fn cable(&self, id: CableId) -> Option<&Cable> {
        self.cables.get(&id)
    }

    pub fn cable_mut(&mut self, id: CableId) -> Option<&mut Cable> {
        self.cables.get_mut(&id)
    }

    pub fn bars(&self) -> impl Iterator<Item = &LedBar> {
        self.bars.values()
    }

    pub fn handles(&self) -> impl Iterator<Item = &Handle> {
        self.handles.values()
    }

    pub fn cables(&self) -> impl Iterator<Item = &Cable> {
        self.cables.values()
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Walk the chain starting from the handle the power source links to.
    ///
    /// Each step records `(bar, entered_at_start)` and advances through the
    /// entry handle's sibling and across its outbound link. The walk is
    /// iterative and carries a visited set; revisiting a bar is a cycle and
    /// fails instead of looping. Nothing is committed on failure.
    pub fn walk_chain(&self, first: HandleId) -> Result<Vec<ChainHop>, TopologyError> {
        let mut hops = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first);
        while let Some(hid) = next {
            let handle = self
                .handles
                .get(&hid)
                .ok_or(TopologyError::UnknownHandle(hid))?;
            let bar_id = match handle.owner {
                NodeId::Bar(id) => id,
                NodeId::PowerSource => break,
            };
            if !visited.insert(bar_id) {
                return Err(TopologyError::CycleDetected(bar_id));
            }
            hops.push(ChainHop {
                bar: bar_id,
                entered_at_start: handle.is_start,
            });
            let sibling = handle.sibling.ok_or(TopologyError::UnknownHandle(hid))?;
            next = self
                .handles
                .get(&sibling)
                .ok_or(TopologyError::UnknownHandle(sibling))?
                .linked;
        }
        Ok(hops)
    }

    pub fn commit_chain(&mut self, hops: Vec<ChainHop>) {
        debug!("chain committed: {} bars", hops.len());
        self.chain = hops;
    }

    pub fn clear_chain(&mut self) {
        self.chain.clear();
    }

    pub fn chain(&self) -> &[ChainHop] {
        &self.chain
    }

    /// Hand every LED a fresh random marker. Used when the power source has
    /// no link, so no stale wire-order index survives.
    pub fn scratch_led_markers<R: Rng>(&mut self, rng: &mut R) {
        for bar in self.bars.values_mut() {
            for led in &mut bar.leds {
                led.marker = LedMarker::Scratch(rng.gen());
            }
        }
    }

    /// Move one endpoint and re-derive its bar's geometry.
    pub fn move_handle<R: Rng>(
        &mut self,
        id: HandleId,
        pos: Vec2,
        rng: &mut R,
    ) -> Result<BarId, TopologyError> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(TopologyError::UnknownHandle(id))?;
        let bar_id = match handle.owner {
            NodeId::Bar(bar) => bar,
            NodeId::PowerSource => return Err(TopologyError::ImmovableHandle),
        };
        handle.pos = pos;
        self.refresh_bar_geometry(bar_id, rng)?;
        Ok(bar_id)
    }

    /// Drag a whole bar: both endpoints shift rigidly.
    pub fn translate_bar<R: Rng>(
        &mut self,
        id: BarId,
        delta: Vec2,
        rng: &mut R,
    ) -> Result<(), TopologyError> {
        let (start, end) = self.endpoint_ids(id)?;
        for hid in [start, end] {
            if let Some(handle) = self.handles.get_mut(&hid) {
                handle.pos += delta;
            }
        }
        self.refresh_bar_geometry(id, rng)
    }

    /// Rotate both endpoints about the bar midpoint by a signed angle in
    /// degrees and re-derive geometry.
    pub fn rotate_bar<R: Rng>(
        &mut self,
        id: BarId,
        degrees: f32,
        rng: &mut R,
    ) -> Result<(), TopologyError> {
        let (start, end) = self.endpoint_ids(id)?;
        let (start_pos, end_pos) = self.endpoint_positions(id)?;
        let mid = (start_pos + end_pos) * 0.5;
        let rot = glam::Mat2::from_angle(degrees.to_radians());
        if let Some(handle) = self.handles.get_mut(&start) {
            handle.pos = mid + rot * (start_pos - mid);
        }
        if let Some(handle) = self.handles.get_mut(&end) {
            handle.pos = mid + rot * (end_pos - mid);
        }
        self.refresh_bar_geometry(id, rng)
    }

    pub fn set_leds_per_meter<R: Rng>(
        &mut self,
        id: BarId,
        leds_per_meter: u16,
        rng: &mut R,
    ) -> Result<(), TopologyError> {
        let bar = self.bars.get_mut(&id).ok_or(TopologyError::UnknownBar(id))?;
        bar.leds_per_meter = leds_per_meter;
        self.refresh_bar_geometry(id, rng)
    }

    /// Re-derive a bar's LED sequence from its current endpoints. Idempotent
    /// when nothing moved.
    pub fn refresh_bar_geometry<R: Rng>(
        &mut self,
        id: BarId,
        rng: &mut R,
    ) -> Result<(), TopologyError> {
        let (start_pos, end_pos) = self.endpoint_positions(id)?;
        let bar = self.bars.get_mut(&id).ok_or(TopologyError::UnknownBar(id))?;
        bar.regenerate(start_pos, end_pos, rng);
        Ok(())
    }

    pub fn endpoint_positions(&self, id: BarId) -> Result<(Vec2, Vec2), TopologyError> {
        let (start, end) = self.endpoint_ids(id)?;
        let start_pos = self
            .handles
            .get(&start)
            .ok_or(TopologyError::UnknownHandle(start))?
            .pos;
        let end_pos = self
            .handles
            .get(&end)
            .ok_or(TopologyError::UnknownHandle(end))?
            .pos;
        Ok((start_pos, end_pos))
    }

    fn endpoint_ids(&self, id: BarId) -> Result<(HandleId, HandleId), TopologyError> {
        let bar = self.bars.get(&id).ok_or(TopologyError::UnknownBar(id))?;
        Ok((bar.start, bar.end))
    }

    fn alloc_bar_id(&mut self) -> BarId {
        let id = BarId(self.next_bar_id);
        self.next_bar_id += 1;
        id
    }

    fn alloc_handle_id(&mut self) -> HandleId {
        let id = HandleId(self.next_handle_id);
        self.next_handle_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn link(inv: &mut Inventory, a: HandleId, b: HandleId) {
        inv.handle_mut(a).unwrap().linked = Some(b);
        inv.handle_mut(b).unwrap().linked = Some(a);
    }

    #[test]
    fn created_bars_have_symmetric_siblings() {
        let mut rng = rng();
        let mut inv = Inventory::new();
        let id = inv.create_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 60, None, &mut rng);
        let bar = inv.bar(id).unwrap();
        let start = inv.handle(bar.start).unwrap();
        let end = inv.handle(bar.end).unwrap();
        assert_eq!(start.sibling, Some(end.id));
        assert_eq!(end.sibling, Some(start.id));
        assert!(start.is_start);
        assert!(!end.is_start);
        assert_eq!(start.owner, NodeId::Bar(id));
    }

    #[test]
    fn ids_stay_unique_across_deletion() {
        let mut rng = rng();
        let mut inv = Inventory::new();
        let a = inv.create_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 60, None, &mut rng);
        let _b = inv.create_bar(vec2(0.0, 50.0), vec2(100.0, 50.0), 60, None, &mut rng);
        let b_handles: Vec<HandleId> = inv.handles().map(|h| h.id).collect();
        inv.delete_bar(a).unwrap();
        let c = inv.create_bar(vec2(0.0, 100.0), vec2(100.0, 100.0), 60, None, &mut rng);
        assert_ne!(c, a);
        let c_bar = inv.bar(c).unwrap();
        assert!(!b_handles.contains(&c_bar.start));
        assert!(!b_handles.contains(&c_bar.end));
    }

    #[test]
    fn walk_follows_siblings_and_links_in_order() {
        let mut rng = rng();
        let mut inv = Inventory::new();
        let a = inv.create_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 60, None, &mut rng);
        let b = inv.create_bar(vec2(120.0, 0.0), vec2(220.0, 0.0), 60, None, &mut rng);
        let c = inv.create_bar(vec2(240.0, 0.0), vec2(340.0, 0.0), 60, None, &mut rng);
        let (a_end, b_start) = (inv.bar(a).unwrap().end, inv.bar(b).unwrap().start);
        // Enter b through its END so the walk records the reversed entry.
        let (b_end, c_start) = (inv.bar(b).unwrap().end, inv.bar(c).unwrap().start);
        link(&mut inv, a_end, b_end);
        link(&mut inv, b_start, c_start);

        let a_start = inv.bar(a).unwrap().start;
        let hops = inv.walk_chain(a_start).unwrap();
        assert_eq!(
            hops,
            vec![
                ChainHop { bar: a, entered_at_start: true },
                ChainHop { bar: b, entered_at_start: false },
                ChainHop { bar: c, entered_at_start: true },
            ]
        );
    }

    #[test]
    fn walk_detects_cycles_instead_of_looping() {
        let mut rng = rng();
        let mut inv = Inventory::new();
        let a = inv.create_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 60, None, &mut rng);
        let b = inv.create_bar(vec2(120.0, 0.0), vec2(220.0, 0.0), 60, None, &mut rng);
        let (a_start, a_end) = (inv.bar(a).unwrap().start, inv.bar(a).unwrap().end);
        let (b_start, b_end) = (inv.bar(b).unwrap().start, inv.bar(b).unwrap().end);
        link(&mut inv, a_end, b_start);
        link(&mut inv, b_end, a_start);

        assert_eq!(
            inv.walk_chain(a_start),
            Err(TopologyError::CycleDetected(a))
        );
    }

    #[test]
    fn deleting_a_linked_bar_is_rejected() {
        let mut rng = rng();
        let mut inv = Inventory::new();
        let a = inv.create_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 60, None, &mut rng);
        let b = inv.create_bar(vec2(120.0, 0.0), vec2(220.0, 0.0), 60, None, &mut rng);
        let (a_end, b_start) = (inv.bar(a).unwrap().end, inv.bar(b).unwrap().start);
        link(&mut inv, a_end, b_start);

        assert_eq!(inv.delete_bar(a), Err(TopologyError::StillLinked(a)));
        assert!(inv.bar(a).is_some());

        inv.handle_mut(a_end).unwrap().linked = None;
        inv.handle_mut(b_start).unwrap().linked = None;
        inv.delete_bar(a).unwrap();
        assert!(inv.bar(a).is_none());
        assert!(inv.handle(a_end).is_none());
    }

    #[test]
    fn lookups_return_none_for_unknown_ids() {
        let inv = Inventory::new();
        assert!(inv.bar(BarId(99)).is_none());
        assert!(inv.handle(HandleId(99)).is_none());
        assert!(inv.cable(CableId(99)).is_none());
    }
}
