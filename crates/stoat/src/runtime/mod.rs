// Runtime value model — operands, parameters, attributes, nodes, and the
// graph that owns them.

mod attribute;
mod graph;
mod operand;
mod operator;
mod param;

pub use attribute::RuntimeAttribute;
pub use graph::{GraphState, RuntimeGraph, INPUT_TYPE, OUTPUT_TYPE};
pub use operand::RuntimeOperand;
pub use operator::{NodeId, RuntimeOperator};
pub use param::RuntimeParameter;
