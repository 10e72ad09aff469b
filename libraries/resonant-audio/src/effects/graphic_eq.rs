//! Graphic equalizer driven by a free-form node list
//!
//! Nodes use the AutoEQ `GraphicEQ:` text format. The node gains are joined
//! by straight lines on a log-frequency axis and realized as a minimum phase
//! FIR.

use super::convolution::{ImpulseResponse, StereoConvolver};
use super::effect::AudioEffect;
use super::fir::{design_fir, Curve, Interpolation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Prefix every node string carries
pub const GRAPHIC_EQ_PREFIX: &str = "GraphicEQ:";

/// FIR length for the graphic EQ
pub const GEQ_FIR_TAPS: usize = 4096;

/// A single node of the curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicEqNode {
    /// Identity token, stable across edits of frequency or gain
    pub uuid: Uuid,
    pub freq: f64,
    pub gain: f64,
}

impl GraphicEqNode {
    pub fn new(freq: f64, gain: f64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            freq,
            gain,
        }
    }
}

/// Ordered list of graphic EQ nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphicEqNodeList {
    nodes: Vec<GraphicEqNode>,
}

impl GraphicEqNodeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphicEqNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, freq: f64, gain: f64) -> Uuid {
        let node = GraphicEqNode::new(freq, gain);
        let uuid = node.uuid;
        self.nodes.push(node);
        uuid
    }

    /// Update a node in place, keeping its identity
    pub fn update(&mut self, uuid: Uuid, freq: f64, gain: f64) -> bool {
        match self.nodes.iter_mut().find(|n| n.uuid == uuid) {
            Some(node) => {
                node.freq = freq;
                node.gain = gain;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, uuid: Uuid) -> Option<GraphicEqNode> {
        let index = self.nodes.iter().position(|n| n.uuid == uuid)?;
        Some(self.nodes.remove(index))
    }

    /// Order nodes by frequency
    pub fn sort(&mut self) {
        self.nodes.sort_by(|a, b| a.freq.total_cmp(&b.freq));
    }

    /// Render as `GraphicEQ: f1 g1; f2 g2; `
    pub fn serialize(&self) -> String {
        let mut out = String::from("GraphicEQ: ");
        for node in &self.nodes {
            out.push_str(&format_decimal(node.freq, 2));
            out.push(' ');
            out.push_str(&format_decimal(node.gain, 6));
            out.push_str("; ");
        }
        out
    }

    /// Parse a node string
    ///
    /// Blank entries and entries that are not a number pair are skipped.
    /// The prefix is matched case-insensitively and is optional here; use
    /// [`has_prefix`] to enforce it.
    pub fn deserialize(text: &str) -> Self {
        let body = strip_prefix(text).replace('\n', " ");

        let nodes = body
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let mut parts = entry.split(' ').filter(|p| !p.is_empty());
                let freq = parts.next()?.parse::<f64>().ok()?;
                let gain = parts.next()?.parse::<f64>().ok()?;
                Some(GraphicEqNode::new(freq, gain))
            })
            .collect();

        Self { nodes }
    }

    fn points(&self) -> Vec<(f64, f64)> {
        self.nodes.iter().map(|n| (n.freq, n.gain)).collect()
    }

    fn is_flat(&self) -> bool {
        self.nodes.iter().all(|n| n.gain.abs() < 1e-6)
    }
}

/// True if `text` contains the `GraphicEQ:` marker (any case)
pub fn has_prefix(text: &str) -> bool {
    text.to_ascii_lowercase()
        .contains(&GRAPHIC_EQ_PREFIX.to_ascii_lowercase())
}

fn strip_prefix(text: &str) -> String {
    let marker = GRAPHIC_EQ_PREFIX.to_ascii_lowercase();
    let lower = text.to_ascii_lowercase();
    match lower.find(&marker) {
        // ASCII lowering keeps byte offsets
        Some(start) => format!("{}{}", &text[..start], &text[start + marker.len()..]),
        None => text.to_string(),
    }
}

/// Up to `max_fraction` decimals, trailing zeros and dot removed
fn format_decimal(value: f64, max_fraction: usize) -> String {
    let mut s = format!("{value:.max_fraction$}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Realize a node list as a stereo FIR; `None` for a flat curve
pub fn prepare_graphic_eq(nodes: &GraphicEqNodeList, sample_rate: f32) -> Option<StereoConvolver> {
    if nodes.is_flat() {
        return None;
    }
    let curve = Curve::log_frequency(&nodes.points(), Interpolation::Linear);
    let kernel = design_fir(|f| curve.eval_frequency(f), GEQ_FIR_TAPS, f64::from(sample_rate));
    ImpulseResponse::new(1, sample_rate, kernel)
        .map(|ir| StereoConvolver::new(&ir))
        .map_err(|e| warn!("Graphic EQ design failed: {}", e))
        .ok()
}

/// Graphic EQ effect
pub struct GraphicEq {
    nodes: GraphicEqNodeList,
    filter: Option<Box<StereoConvolver>>,
    enabled: bool,
}

impl GraphicEq {
    pub fn new() -> Self {
        Self {
            nodes: GraphicEqNodeList::new(),
            filter: None,
            enabled: false,
        }
    }

    /// Swap in prepared nodes and filter; returns the previous ones
    pub fn install(
        &mut self,
        enabled: bool,
        mut nodes: Box<GraphicEqNodeList>,
        filter: Option<Box<StereoConvolver>>,
    ) -> (Box<GraphicEqNodeList>, Option<Box<StereoConvolver>>) {
        std::mem::swap(&mut self.nodes, &mut *nodes);
        self.enabled = enabled;
        (nodes, std::mem::replace(&mut self.filter, filter))
    }

    pub fn nodes(&self) -> &GraphicEqNodeList {
        &self.nodes
    }
}

impl Default for GraphicEq {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for GraphicEq {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        if let Some(filter) = self.filter.as_mut() {
            filter.process(buffer);
        }
    }

    /// The current filter keeps running until a redesign is installed
    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Graphic EQ"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::fir::response_db;

    #[test]
    fn serialize_format() {
        let mut list = GraphicEqNodeList::new();
        list.push(20.0, -1.5);
        list.push(1000.125, 3.0);
        list.push(16000.0, 0.1234567);
        assert_eq!(
            list.serialize(),
            "GraphicEQ: 20 -1.5; 1000.12 3; 16000 0.123457; "
        );
    }

    #[test]
    fn deserialize_is_tolerant() {
        let list =
            GraphicEqNodeList::deserialize("graphiceq: 20 1;;  100   -2.5 ;\n bogus; 200;1000 x; 5000 4");
        let pairs: Vec<(f64, f64)> = list.nodes().iter().map(|n| (n.freq, n.gain)).collect();
        assert_eq!(pairs, vec![(20.0, 1.0), (100.0, -2.5), (5000.0, 4.0)]);
    }

    #[test]
    fn nodes_get_distinct_ids() {
        let list = GraphicEqNodeList::deserialize("GraphicEQ: 20 0; 40 0");
        assert_ne!(list.nodes()[0].uuid, list.nodes()[1].uuid);
    }

    #[test]
    fn update_keeps_identity() {
        let mut list = GraphicEqNodeList::new();
        let id = list.push(100.0, 0.0);
        assert!(list.update(id, 120.0, 2.0));
        assert_eq!(list.nodes()[0].uuid, id);
        assert_eq!(list.nodes()[0].freq, 120.0);
        assert!(list.remove(id).is_some());
        assert!(list.is_empty());
    }

    #[test]
    fn prefix_detection() {
        assert!(has_prefix("GraphicEQ: 1 1"));
        assert!(has_prefix("GRAPHICEQ:"));
        assert!(!has_prefix("25 1; 40 2"));
        assert!(!has_prefix(""));
    }

    #[test]
    fn default_nodes_are_flat() {
        let list = GraphicEqNodeList::deserialize(resonant_core::defaults::GEQ_NODES);
        assert_eq!(list.len(), 1);
        assert!(prepare_graphic_eq(&list, 48000.0).is_none());
    }

    #[test]
    fn curve_follows_nodes() {
        let list = GraphicEqNodeList::deserialize("GraphicEQ: 20 0; 500 0; 1000 6; 2000 0; 20000 0");
        let curve = Curve::log_frequency(&list.points(), Interpolation::Linear);
        let kernel = design_fir(|f| curve.eval_frequency(f), GEQ_FIR_TAPS, 48000.0);
        assert!((response_db(&kernel, 1000.0, 48000.0) - 6.0).abs() < 0.5);
        assert!(response_db(&kernel, 100.0, 48000.0).abs() < 0.5);
    }
}
