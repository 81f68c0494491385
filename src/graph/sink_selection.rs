// Sink selection for restoring the default recording path
//
// Analog/stereo outputs first, then other real sinks, GPU/HDMI outputs only
// as a last resort. Virtual, loopback and echo-cancel sinks are never picked.
// A user-preferred sink name overrides the tiers when it is present.

use serde::Serialize;
use tracing::debug;

use super::classifier::{is_analog_sink, is_gpu_sink, is_hardware_sink, is_virtual_sink};
use super::snapshot::Snapshot;
use super::types::{keys, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SinkTier {
    Preferred,
    Analog,
    Other,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkChoice {
    pub node_id: ObjectId,
    pub name: String,
    pub tier: SinkTier,
}

/// Pick the sink to reconnect to the recording target
pub fn select_restore_sink(snapshot: &Snapshot, preferred: Option<&str>) -> Option<SinkChoice> {
    let mut best: Option<SinkChoice> = None;

    for node in snapshot.nodes() {
        if !is_hardware_sink(&node.properties) {
            continue;
        }
        let name = node.prop(keys::NODE_NAME).to_string();
        if is_virtual_sink(&node.properties) {
            debug!("Sink {} ({}) is virtual, skipping", node.id, name);
            continue;
        }

        let tier = if preferred.is_some_and(|wanted| wanted == name) {
            SinkTier::Preferred
        } else if is_gpu_sink(&node.properties) {
            SinkTier::Gpu
        } else if is_analog_sink(&node.properties) {
            SinkTier::Analog
        } else {
            SinkTier::Other
        };
        debug!("Sink {} ({}) → {:?}", node.id, name, tier);

        // Strictly better tier wins; ties keep the first discovered sink
        if best.as_ref().map_or(true, |current| tier < current.tier) {
            best = Some(SinkChoice {
                node_id: node.id,
                name,
                tier,
            });
        }
    }

    best
}
