// LayerRegistry — maps operator type strings to layer builders
//
// The registry is a plain value passed to `RuntimeGraph::build`, not a
// process-wide singleton. Tests construct private registries; applications
// usually start from `with_builtin_layers` and add custom types on top.

use std::collections::HashMap;

use stoat_core::{Error, Result};

use crate::layer::{
    AdaptiveAveragePoolingLayer, ConvLayer, ExpressionLayer, FlattenLayer, Layer, LinearLayer,
    MaxPoolingLayer, ReluLayer, SigmoidLayer,
};
use crate::runtime::RuntimeOperator;

/// Builds a layer instance from a node's params and attrs.
pub type LayerBuilder = fn(&RuntimeOperator) -> Result<Box<dyn Layer>>;

/// Registry of layer builders, keyed by operator type string.
pub struct LayerRegistry {
    builders: HashMap<String, LayerBuilder>,
}

impl LayerRegistry {
    /// An empty registry with no types registered.
    pub fn new() -> Self {
        LayerRegistry {
            builders: HashMap::new(),
        }
    }

    /// A registry preloaded with every built-in layer type.
    pub fn with_builtin_layers() -> Self {
        let mut r = LayerRegistry::new();
        // Type strings follow the convention of the model format this
        // engine loads; registration cannot collide here, so unwrapping
        // through the Result would only obscure the list.
        r.builders.insert("nn.Conv2d".to_string(), ConvLayer::build as LayerBuilder);
        r.builders.insert("nn.MaxPool2d".to_string(), MaxPoolingLayer::build as LayerBuilder);
        r.builders.insert(
            "nn.AdaptiveAvgPool2d".to_string(),
            AdaptiveAveragePoolingLayer::build as LayerBuilder,
        );
        r.builders.insert("nn.Linear".to_string(), LinearLayer::build as LayerBuilder);
        r.builders.insert("nn.ReLU".to_string(), ReluLayer::build as LayerBuilder);
        r.builders.insert("nn.Sigmoid".to_string(), SigmoidLayer::build as LayerBuilder);
        r.builders.insert("torch.flatten".to_string(), FlattenLayer::build as LayerBuilder);
        r.builders.insert("pnnx.Expression".to_string(), ExpressionLayer::build as LayerBuilder);
        r
    }

    /// Register a builder for a type string. Duplicate registration of the
    /// same type is an error.
    pub fn register(&mut self, type_name: &str, builder: LayerBuilder) -> Result<()> {
        if self.builders.contains_key(type_name) {
            return Err(Error::DuplicateLayer {
                type_name: type_name.to_string(),
            });
        }
        self.builders.insert(type_name.to_string(), builder);
        Ok(())
    }

    /// Whether a type string has a registered builder.
    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    /// Build a layer for the given node from its `type_name`.
    pub fn build(&self, op: &RuntimeOperator) -> Result<Box<dyn Layer>> {
        let builder = self.builders.get(&op.type_name).ok_or_else(|| Error::UnknownLayer {
            type_name: op.type_name.clone(),
        })?;
        builder(op)
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::with_builtin_layers()
    }
}
