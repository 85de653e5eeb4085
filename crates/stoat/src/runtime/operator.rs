// RuntimeOperator — one node of the runtime graph
//
// Nodes live in an arena (`Vec<RuntimeOperator>` inside RuntimeGraph) and
// address each other by stable integer index. Adjacency is a list of
// consumer NodeIds resolved once after every node exists; there are no
// shared-pointer back-references and no reference cycles.

use std::collections::HashMap;

use stoat_core::{Error, Result};

use crate::layer::Layer;
use crate::runtime::attribute::RuntimeAttribute;
use crate::runtime::operand::RuntimeOperand;
use crate::runtime::param::RuntimeParameter;

/// Stable index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// One graph node: identity, input/output operands, adjacency, config, and
/// the attached compute layer.
pub struct RuntimeOperator {
    /// Node name, unique within the graph (e.g. "conv1").
    pub name: String,
    /// Operator type string (e.g. "nn.Conv2d"), the registry key.
    pub type_name: String,

    /// Input operands in the positional order the layer expects.
    pub inputs: Vec<RuntimeOperand>,
    /// Producer node name -> index into `inputs`. Insertion order is
    /// irrelevant here; `inputs` carries the positional order.
    pub input_index: HashMap<String, usize>,

    /// The single output operand, allocated during build.
    pub output_operand: Option<RuntimeOperand>,
    /// Declared output shape from the IR (batch dim first), if any.
    pub output_shape: Option<Vec<usize>>,
    /// Names of downstream consumer nodes, as listed by the IR.
    pub consumer_names: Vec<String>,
    /// Consumer nodes resolved to arena indices (second init pass).
    pub consumers: Vec<NodeId>,

    /// Operator configuration values.
    pub params: HashMap<String, RuntimeParameter>,
    /// Trained weight blobs.
    pub attrs: HashMap<String, RuntimeAttribute>,

    /// The compute layer, attached during build. Sentinel nodes have none.
    pub layer: Option<Box<dyn Layer>>,

    /// Readiness counter: how many distinct upstream edges have delivered
    /// data in the current forward pass. Always <= `inputs.len()`; the node
    /// is schedulable exactly when the two are equal.
    pub meet_time: usize,
}

impl RuntimeOperator {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        RuntimeOperator {
            name: name.into(),
            type_name: type_name.into(),
            inputs: Vec::new(),
            input_index: HashMap::new(),
            output_operand: None,
            output_shape: None,
            consumer_names: Vec::new(),
            consumers: Vec::new(),
            params: HashMap::new(),
            attrs: HashMap::new(),
            layer: None,
            meet_time: 0,
        }
    }

    /// Whether every upstream edge has delivered data this pass.
    pub fn is_ready(&self) -> bool {
        debug_assert!(self.meet_time <= self.inputs.len());
        self.meet_time == self.inputs.len()
    }

    /// Look up a configuration value by name.
    pub fn param(&self, name: &str) -> Result<&RuntimeParameter> {
        self.params.get(name).ok_or_else(|| Error::MissingParameter {
            op: self.name.clone(),
            name: name.to_string(),
        })
    }

    /// Look up a weight blob by name.
    pub fn attribute(&self, name: &str) -> Result<&RuntimeAttribute> {
        self.attrs.get(name).ok_or_else(|| Error::MissingAttribute {
            op: self.name.clone(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Debug for RuntimeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeOperator")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs.len())
            .field("consumers", &self.consumers)
            .field("meet_time", &self.meet_time)
            .finish()
    }
}
