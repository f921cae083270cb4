use crate::inventory::Inventory;
use crate::model::{
    BarId, Cable, CableId, Color, Handle, HandleId, LedBar, NodeId, END_HANDLE_TAG,
    START_HANDLE_TAG,
};
use glam::vec2;
use log::debug;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Saved form of one bar. Field names match the JSON documents the layout
/// tool has always produced, so existing files keep loading.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BarRecord {
    pub id: BarId,
    pub start_point: HandleRecord,
    pub end_point: HandleRecord,
    pub leds_per_meter: u16,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandleRecord {
    pub coord: Coord,
    pub led_bar_id: BarId,
    pub id: HandleId,
    pub is_start_point: bool,
    pub sibling: HandleId,
    pub linked_handle: Option<HandleId>,
    pub cable: Option<CableRecord>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coord {
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CableRecord {
    pub start_handle: HandleId,
    pub end_handle: HandleId,
    pub id: CableId,
}

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("malformed layout document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("duplicate {0} in document")]
    DuplicateBar(BarId),
    #[error("duplicate {0} in document")]
    DuplicateHandle(HandleId),
    #[error("{0} uses the reserved power-source handle id")]
    ReservedHandleId(HandleId),
    #[error("{bar}: endpoint records are not siblings of each other")]
    SiblingMismatch { bar: BarId },
    #[error("{handle} is recorded under {bar} but claims a different owner")]
    OwnerMismatch { handle: HandleId, bar: BarId },
    #[error("{from} links to {to}, which is not in the document")]
    DanglingLink { from: HandleId, to: HandleId },
    #[error("{from} links to a handle on its own bar")]
    SameBarLink { from: HandleId },
    #[error("link between {a} and {b} is not symmetric")]
    AsymmetricLink { a: HandleId, b: HandleId },
    #[error("cable on {handle} references {missing}, which is not in the document")]
    DanglingCable { handle: HandleId, missing: HandleId },
}

pub fn to_json(records: &[BarRecord]) -> Result<String, LayoutError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn from_json(json: &str) -> Result<Vec<BarRecord>, LayoutError> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize every bar with both handle records. Links and cables that touch
/// the power source are omitted: power wiring is workspace state, not layout,
/// and is re-established after load.
pub fn save(inventory: &Inventory) -> Vec<BarRecord> {
    inventory
        .bars()
        .filter_map(|bar| {
            Some(BarRecord {
                id: bar.id,
                start_point: handle_record(inventory, bar.start)?,
                end_point: handle_record(inventory, bar.end)?,
                leds_per_meter: bar.leds_per_meter,
            })
        })
        .collect()
}

fn handle_record(inventory: &Inventory, id: HandleId) -> Option<HandleRecord> {
    let handle = inventory.handle(id)?;
    let bar_id = match handle.owner {
        NodeId::Bar(b) => b,
        // The power handle is never reached through a bar.
        NodeId::PowerSource => return None,
    };
    let linked_to_power = handle.linked == Some(HandleId::POWER);
    Some(HandleRecord {
        coord: Coord {
            x: handle.pos.x,
            y: handle.pos.y,
        },
        led_bar_id: bar_id,
        id,
        is_start_point: handle.is_start,
        sibling: handle.sibling.unwrap_or(id),
        linked_handle: handle.linked.filter(|_| !linked_to_power),
        cable: handle
            .cable
            .filter(|_| !linked_to_power)
            .and_then(|cid| inventory.cable(cid))
            .and_then(|c| {
                c.end.map(|end| CableRecord {
                    start_handle: c.start,
                    end_handle: end,
                    id: c.id,
                })
            }),
    })
}

/// Rebuild an inventory from a document.
///
/// The whole document is validated first, so a malformed file fails before
/// any state exists. Construction is then staged the way the references
/// require: all bars and handles under their final ids, then links, then
/// cables — and a cable is only instantiated from the endpoint whose record
/// names it as the cable's start, so each physical cable exists once.
pub fn load(records: &[BarRecord]) -> Result<Inventory, LayoutError> {
    validate(records)?;

    let mut rng = thread_rng();
    let mut inventory = Inventory::new();

    for record in records {
        let start = rebuild_handle(record, &record.start_point, START_HANDLE_TAG);
        let end = rebuild_handle(record, &record.end_point, END_HANDLE_TAG);
        let mut bar = LedBar {
            id: record.id,
            start: start.id,
            end: end.id,
            leds_per_meter: record.leds_per_meter,
            leds: Vec::new(),
            rotation: 0.0,
        };
        bar.regenerate(start.pos, end.pos, &mut rng);
        inventory.register_loaded_bar(bar, start, end);
    }

    for record in records {
        for endpoint in [&record.start_point, &record.end_point] {
            if let Some(linked) = endpoint.linked_handle {
                if let Some(handle) = inventory.handle_mut(endpoint.id) {
                    handle.linked = Some(linked);
                }
            }
        }
    }

    for record in records {
        for endpoint in [&record.start_point, &record.end_point] {
            let Some(cable) = endpoint.cable else { continue };
            if cable.start_handle != endpoint.id {
                continue;
            }
            inventory.register_loaded_cable(Cable {
                id: cable.id,
                start: cable.start_handle,
                end: Some(cable.end_handle),
            });
            for hid in [cable.start_handle, cable.end_handle] {
                if let Some(handle) = inventory.handle_mut(hid) {
                    handle.cable = Some(cable.id);
                }
            }
        }
    }

    debug!("document loaded: {} bars", inventory.bar_count());
    Ok(inventory)
}

fn rebuild_handle(record: &BarRecord, endpoint: &HandleRecord, tag: Color) -> Handle {
    let mut handle = Handle::new(
        endpoint.id,
        NodeId::Bar(record.id),
        vec2(endpoint.coord.x, endpoint.coord.y),
        tag,
        endpoint.is_start_point,
    );
    handle.sibling = Some(endpoint.sibling);
    handle
}

fn validate(records: &[BarRecord]) -> Result<(), LayoutError> {
    let mut owners: HashMap<HandleId, BarId> = HashMap::new();
    let mut bar_ids = std::collections::HashSet::new();

    for record in records {
        if !bar_ids.insert(record.id) {
            return Err(LayoutError::DuplicateBar(record.id));
        }
        for endpoint in [&record.start_point, &record.end_point] {
            if endpoint.id == HandleId::POWER {
                return Err(LayoutError::ReservedHandleId(endpoint.id));
            }
            if endpoint.led_bar_id != record.id {
                return Err(LayoutError::OwnerMismatch {
                    handle: endpoint.id,
                    bar: record.id,
                });
            }
            if owners.insert(endpoint.id, record.id).is_some() {
                return Err(LayoutError::DuplicateHandle(endpoint.id));
            }
        }
        if record.start_point.sibling != record.end_point.id
            || record.end_point.sibling != record.start_point.id
        {
            return Err(LayoutError::SiblingMismatch { bar: record.id });
        }
    }

    let mut links: HashMap<HandleId, HandleId> = HashMap::new();
    for record in records {
        for endpoint in [&record.start_point, &record.end_point] {
            if let Some(linked) = endpoint.linked_handle {
                match owners.get(&linked) {
                    None => {
                        return Err(LayoutError::DanglingLink {
                            from: endpoint.id,
                            to: linked,
                        })
                    }
                    Some(&owner) if owner == record.id => {
                        return Err(LayoutError::SameBarLink { from: endpoint.id })
                    }
                    Some(_) => {}
                }
                links.insert(endpoint.id, linked);
            }
            if let Some(cable) = endpoint.cable {
                for hid in [cable.start_handle, cable.end_handle] {
                    if !owners.contains_key(&hid) {
                        return Err(LayoutError::DanglingCable {
                            handle: endpoint.id,
                            missing: hid,
                        });
                    }
                }
            }
        }
    }
    for (&a, &b) in &links {
        if links.get(&b) != Some(&a) {
            return Err(LayoutError::AsymmetricLink { a, b });
        }
    }
    Ok(())
}
