// RuntimeGraph — loading, building, and executing the computation graph
//
// The graph moves through three states. `init` materializes the node arena
// from the serialized IR and resolves every producer -> consumer edge to an
// integer NodeId. `build` attaches a compute layer to every non-sentinel
// node and preallocates output operand storage. `forward` then runs a
// readiness-counted breadth-first schedule: a node enters the work queue
// once every one of its upstream edges has delivered data, and the pass
// runs until the output sentinel itself is dequeued.
//
// Tensors travel along edges as Arc<Tensor>. Propagation clones the Arc,
// never the buffer; layers fill their output slots with freshly allocated
// tensors, so a caller still holding last pass's output keeps an intact
// copy.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use stoat_core::{bail, Error, Result, Tensor};

use crate::ir::{self, IrNode};
use crate::layer::LayerRegistry;
use crate::runtime::operand::RuntimeOperand;
use crate::runtime::operator::{NodeId, RuntimeOperator};

/// Sentinel type string for the node that receives the caller's input batch.
pub const INPUT_TYPE: &str = "graph.Input";
/// Sentinel type string for the node whose inputs are the pass result.
pub const OUTPUT_TYPE: &str = "graph.Output";

/// Lifecycle phase of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Constructed; nodes not yet loaded.
    NeedInit,
    /// Nodes loaded and edges resolved; layers not yet attached.
    NeedBuild,
    /// Ready to execute.
    Complete,
}

/// An executable computation graph.
pub struct RuntimeGraph {
    ir_path: PathBuf,
    weights_path: PathBuf,
    state: GraphState,
    nodes: Vec<RuntimeOperator>,
    name_index: HashMap<String, NodeId>,
    input_node: Option<NodeId>,
    output_node: Option<NodeId>,
}

impl RuntimeGraph {
    /// Create a graph bound to a model on disk. Nothing is read until
    /// `init` is called.
    pub fn new(ir_path: impl Into<PathBuf>, weights_path: impl Into<PathBuf>) -> Self {
        RuntimeGraph {
            ir_path: ir_path.into(),
            weights_path: weights_path.into(),
            state: GraphState::NeedInit,
            nodes: Vec::new(),
            name_index: HashMap::new(),
            input_node: None,
            output_node: None,
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// The node arena, in definition order.
    pub fn nodes(&self) -> &[RuntimeOperator] {
        &self.nodes
    }

    /// Look up a node by name.
    pub fn get(&self, name: &str) -> Option<&RuntimeOperator> {
        self.name_index.get(name).map(|id| &self.nodes[id.0])
    }

    /// Load the model files and populate the node arena.
    pub fn init(&mut self) -> Result<()> {
        let ir_nodes = ir::load_graph(&self.ir_path, &self.weights_path)?;
        self.init_with(ir_nodes)
    }

    /// Populate the node arena from an in-memory IR. This is the whole of
    /// `init` minus the file parsing.
    pub fn init_with(&mut self, ir_nodes: Vec<IrNode>) -> Result<()> {
        if ir_nodes.is_empty() {
            bail!("graph has no nodes");
        }
        self.nodes.clear();
        self.name_index.clear();
        self.input_node = None;
        self.output_node = None;

        for ir_node in ir_nodes {
            let id = NodeId(self.nodes.len());
            if self.name_index.insert(ir_node.name.clone(), id).is_some() {
                bail!("duplicate node name '{}'", ir_node.name);
            }
            let mut op = RuntimeOperator::new(ir_node.name, ir_node.type_name);
            for decl in ir_node.inputs {
                let slot = op.inputs.len();
                if op.input_index.insert(decl.producer.clone(), slot).is_some() {
                    bail!("node '{}' lists producer '{}' twice", op.name, decl.producer);
                }
                op.inputs.push(RuntimeOperand {
                    name: decl.producer,
                    shape: decl.shape,
                    dtype: decl.dtype,
                    datas: Vec::new(),
                });
            }
            op.output_shape = ir_node.output_shape;
            op.params = ir_node.params;
            op.attrs = ir_node.attrs;
            self.nodes.push(op);
        }

        // Edges are declared from the consumer side; invert them so each
        // producer knows its consumers.
        let mut edges: Vec<(String, NodeId)> = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            for operand in &node.inputs {
                edges.push((operand.name.clone(), NodeId(idx)));
            }
        }
        for (producer_name, consumer_id) in edges {
            let producer_id = *self
                .name_index
                .get(&producer_name)
                .ok_or_else(|| Error::NodeNotFound {
                    name: producer_name.clone(),
                })?;
            let consumer_name = self.nodes[consumer_id.0].name.clone();
            let producer = &mut self.nodes[producer_id.0];
            producer.consumer_names.push(consumer_name);
            producer.consumers.push(consumer_id);
        }

        log::info!("graph initialized with {} nodes", self.nodes.len());
        self.state = GraphState::NeedBuild;
        Ok(())
    }

    /// Attach compute layers and preallocate output operands, designating
    /// the named nodes as the input and output sentinels. The graph is
    /// executable afterwards. Building an already built graph is allowed
    /// and re-runs allocation.
    pub fn build(
        &mut self,
        registry: &LayerRegistry,
        input_name: &str,
        output_name: &str,
    ) -> Result<()> {
        if self.state == GraphState::NeedInit {
            bail!("graph must be initialized before build");
        }

        let input_id = self.sentinel(input_name, INPUT_TYPE)?;
        let output_id = self.sentinel(output_name, OUTPUT_TYPE)?;
        self.input_node = Some(input_id);
        self.output_node = Some(output_id);

        for idx in 0..self.nodes.len() {
            let id = NodeId(idx);
            if id == input_id || id == output_id {
                continue;
            }
            let layer = registry.build(&self.nodes[idx])?;
            self.nodes[idx].layer = Some(layer);

            let node = &mut self.nodes[idx];
            let shape = match node.output_shape {
                Some(ref s) => s.clone(),
                None => bail!("node '{}' declares no output shape", node.name),
            };
            let operand = alloc_output_operand(&node.name, &shape, node.output_operand.take())?;
            node.output_operand = Some(operand);
        }

        log::info!(
            "graph built: {} nodes, input '{}', output '{}'",
            self.nodes.len(),
            self.nodes[input_id.0].name,
            self.nodes[output_id.0].name
        );
        self.state = GraphState::Complete;
        Ok(())
    }

    /// Resolve a sentinel node by name and check its declared type.
    fn sentinel(&self, name: &str, expected_type: &str) -> Result<NodeId> {
        let id = *self
            .name_index
            .get(name)
            .ok_or_else(|| Error::NodeNotFound {
                name: name.to_string(),
            })?;
        let node = &self.nodes[id.0];
        if node.type_name != expected_type {
            bail!(
                "node '{}' has type '{}', expected sentinel type '{}'",
                name,
                node.type_name,
                expected_type
            );
        }
        Ok(id)
    }

    /// Execute one forward pass over a batch. `inputs` feeds the input
    /// sentinel's consumers; the returned tensors are whatever arrived at
    /// the output sentinel. With `debug` every executed node dumps its
    /// output tensors to the log.
    pub fn forward(&mut self, inputs: Vec<Arc<Tensor>>, debug: bool) -> Result<Vec<Arc<Tensor>>> {
        if self.state != GraphState::Complete {
            bail!("graph must be built before forward");
        }
        if inputs.is_empty() {
            return Err(Error::EmptyTensor { op: "forward" });
        }
        let input_id = match self.input_node {
            Some(id) => id,
            None => bail!("graph has no input node"),
        };
        let output_id = match self.output_node {
            Some(id) => id,
            None => bail!("graph has no output node"),
        };

        // Readiness counters are reset once per pass, never mid-pass.
        for node in &mut self.nodes {
            node.meet_time = 0;
        }

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(input_id);

        while let Some(id) = queue.pop_front() {
            if id == output_id {
                let out = &self.nodes[output_id.0];
                let mut result = Vec::new();
                for operand in &out.inputs {
                    result.extend(operand.datas.iter().cloned());
                }
                return Ok(result);
            }

            let produced = if id == input_id {
                inputs.clone()
            } else {
                let mut gathered = Vec::new();
                for operand in &self.nodes[id.0].inputs {
                    gathered.extend(operand.datas.iter().cloned());
                }
                let RuntimeOperator {
                    name,
                    layer,
                    output_operand,
                    ..
                } = &mut self.nodes[id.0];
                let layer = match layer.as_deref() {
                    Some(l) => l,
                    None => bail!("node '{}' has no layer attached", name),
                };
                let operand = match output_operand {
                    Some(o) => o,
                    None => bail!("node '{}' has no output operand", name),
                };
                log::debug!("executing '{}' ({})", name, layer.name());
                layer.forward(&gathered, &mut operand.datas)?;
                if debug {
                    log::info!("'{}' produced {} tensor(s)", name, operand.datas.len());
                    for tensor in operand.datas.iter() {
                        tensor.show();
                    }
                }
                operand.datas.clone()
            };

            let consumers = self.nodes[id.0].consumers.clone();
            let producer_name = self.nodes[id.0].name.clone();
            for cid in consumers {
                let consumer = &mut self.nodes[cid.0];
                let slot = *consumer
                    .input_index
                    .get(&producer_name)
                    .ok_or_else(|| Error::NodeNotFound {
                        name: producer_name.clone(),
                    })?;
                if id == input_id {
                    check_input_batch(&consumer.inputs[slot], &produced)?;
                }
                consumer.inputs[slot].datas = produced.clone();
                consumer.meet_time += 1;
                if consumer.is_ready() {
                    queue.push_back(cid);
                }
            }
        }

        // The queue drained without the output sentinel ever becoming
        // ready: some node is waiting on an edge no pass will fill.
        let stuck = self
            .nodes
            .iter()
            .find(|n| !n.is_ready())
            .map(|n| n.name.clone())
            .unwrap_or_else(|| self.nodes[output_id.0].name.clone());
        Err(Error::Deadlock { name: stuck })
    }
}

/// Map a declared operand shape (batch dim first, 2 to 4 dims, no zero
/// extents) onto the channels/rows/cols tensor view.
fn view_dims(shape: &[usize]) -> Result<(usize, usize, usize)> {
    if !(2..=4).contains(&shape.len()) || shape.contains(&0) {
        return Err(Error::ShapeMismatch {
            expected: vec![],
            got: shape.to_vec(),
        });
    }
    Ok(match shape.len() {
        4 => (shape[1], shape[2], shape[3]),
        3 => (1, shape[1], shape[2]),
        _ => (1, 1, shape[1]),
    })
}

/// Check a caller-supplied batch against the declared shape of the operand
/// it is about to fill. Declared shapes are trusted after build; the
/// caller's tensors are not.
fn check_input_batch(operand: &RuntimeOperand, batch: &[Arc<Tensor>]) -> Result<()> {
    if batch.len() != operand.batch_size() {
        bail!(
            "input batch has {} tensor(s) but operand '{}' declares batch size {}",
            batch.len(),
            operand.name,
            operand.batch_size()
        );
    }
    let (channels, rows, cols) = view_dims(&operand.shape)?;
    for tensor in batch {
        if tensor.shape() != [channels, rows, cols] {
            return Err(Error::ShapeMismatch {
                expected: vec![channels, rows, cols],
                got: tensor.shape().to_vec(),
            });
        }
    }
    Ok(())
}

/// Allocate (or revalidate) a node's output operand from its declared
/// shape. Shapes arrive with a leading batch dimension; the remaining one
/// to three dims map onto the channels/rows/cols view.
fn alloc_output_operand(
    op_name: &str,
    shape: &[usize],
    existing: Option<RuntimeOperand>,
) -> Result<RuntimeOperand> {
    let (channels, rows, cols) = view_dims(shape)?;
    let batch = shape[0];

    let mut operand = match existing {
        Some(o) if o.datas.len() == batch => o,
        _ => RuntimeOperand {
            name: op_name.to_string(),
            shape: shape.to_vec(),
            dtype: stoat_core::DType::F32,
            datas: (0..batch)
                .map(|_| Arc::new(Tensor::new(channels, rows, cols)))
                .collect(),
        },
    };
    operand.shape = shape.to_vec();

    for tensor in &mut operand.datas {
        if tensor.shape() != [channels, rows, cols] {
            log::warn!(
                "node '{}' output tensor has shape {:?}, expected {:?}; reallocating",
                op_name,
                tensor.shape(),
                [channels, rows, cols]
            );
            if tensor.size() == channels * rows * cols {
                Arc::make_mut(tensor).reshape(&[channels, rows, cols], false)?;
            } else {
                *tensor = Arc::new(Tensor::new(channels, rows, cols));
            }
        }
    }
    Ok(operand)
}
