// IR tests — loading serialized models from disk and running them

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use stoat::ir;
use stoat::layer::LayerRegistry;
use stoat::runtime::{RuntimeGraph, RuntimeParameter};
use stoat_core::Tensor;

fn write_model(name: &str, graph_text: &str, weights: &[f32]) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir();
    let graph_path = dir.join(format!("stoat-{}-{}.graph", std::process::id(), name));
    let weights_path = dir.join(format!("stoat-{}-{}.weights", std::process::id(), name));
    fs::write(&graph_path, graph_text).unwrap();
    let bytes: Vec<u8> = weights.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(&weights_path, bytes).unwrap();
    (graph_path, weights_path)
}

fn input_4x4() -> Arc<Tensor> {
    let vals: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    let mut t = Tensor::new(1, 4, 4);
    t.fill_with(&vals, true).unwrap();
    Arc::new(t)
}

#[test]
fn test_load_parses_nodes_params_attrs() {
    let text = "\
stoat.graph.v1
# a comment line
node graph.Input input
out (1,1,4,4)
node nn.Conv2d conv
in input (1,1,4,4)
out (1,1,2,2)
param in_channels 1
param bias false
param kernel_size [3,3]
param expr add(@0,@1)
attr weight f32 (1,1,3,3) 0 9
node graph.Output output
in conv (1,1,2,2)
";
    let (graph_path, weights_path) = write_model("parse", text, &[0.5; 9]);
    let nodes = ir::load_graph(&graph_path, &weights_path).unwrap();
    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();

    assert_eq!(nodes.len(), 3);
    let conv = &nodes[1];
    assert_eq!(conv.name, "conv");
    assert_eq!(conv.inputs[0].producer, "input");
    assert_eq!(conv.output_shape.as_deref(), Some(&[1, 1, 2, 2][..]));
    assert_eq!(conv.params["in_channels"], RuntimeParameter::Int(1));
    assert_eq!(conv.params["bias"], RuntimeParameter::Bool(false));
    assert_eq!(
        conv.params["kernel_size"],
        RuntimeParameter::IntArray(vec![3, 3])
    );
    assert_eq!(
        conv.params["expr"],
        RuntimeParameter::String("add(@0,@1)".to_string())
    );
    assert_eq!(conv.attrs["weight"].shape, vec![1, 1, 3, 3]);
    assert_eq!(conv.attrs["weight"].decode_f32().unwrap(), vec![0.5; 9]);
}

#[test]
fn test_bad_magic_is_error() {
    let (graph_path, weights_path) = write_model("magic", "not.a.graph\n", &[]);
    let result = ir::load_graph(&graph_path, &weights_path);
    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();
    assert!(result.is_err());
}

#[test]
fn test_attr_past_blob_end_is_error() {
    let text = "\
stoat.graph.v1
node nn.Conv2d conv
attr weight f32 (1,1,3,3) 0 9
";
    let (graph_path, weights_path) = write_model("short", text, &[0.0; 4]);
    let result = ir::load_graph(&graph_path, &weights_path);
    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();
    assert!(result.is_err());
}

#[test]
fn test_conv_model_end_to_end() {
    let text = "\
stoat.graph.v1
node graph.Input input
out (1,1,4,4)
node nn.Conv2d conv
in input (1,1,4,4)
out (1,1,2,2)
param in_channels 1
param out_channels 1
param kernel_size [3,3]
param stride [1,1]
param padding [0,0]
param groups 1
param bias false
attr weight f32 (1,1,3,3) 0 9
node graph.Output output
in conv (1,1,2,2)
";
    let weights = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0];
    let (graph_path, weights_path) = write_model("conv", text, &weights);

    let mut graph = RuntimeGraph::new(&graph_path, &weights_path);
    graph.init().unwrap();
    graph
        .build(&LayerRegistry::with_builtin_layers(), "input", "output")
        .unwrap();
    let outputs = graph.forward(vec![input_4x4()], false).unwrap();

    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].shape(), [1, 2, 2]);
    assert_eq!(outputs[0].values(true), vec![132.0, 150.0, 204.0, 222.0]);
}

#[test]
fn test_pool_flatten_linear_model_end_to_end() {
    // maxpool 2x2/2 with pad 1 turns the 4x4 ramp into the 3x3 matrix
    // [1,3,4; 9,11,12; 13,15,16]; flatten feeds it to a linear layer whose
    // weight row sums the nine values and adds bias 1.
    let text = "\
stoat.graph.v1
node graph.Input input
out (1,1,4,4)
node nn.MaxPool2d pool
in input (1,1,4,4)
out (1,1,3,3)
param kernel_size [2,2]
param stride [2,2]
param padding [1,1]
node torch.flatten flat
in pool (1,1,3,3)
out (1,9)
param start_dim 1
param end_dim 3
node nn.Linear fc
in flat (1,9)
out (1,1)
param bias true
attr weight f32 (1,9) 0 9
attr bias f32 (1) 9 1
node graph.Output output
in fc (1,1)
";
    let mut weights = vec![1.0f32; 9];
    weights.push(1.0); // bias
    let (graph_path, weights_path) = write_model("mlp", text, &weights);

    let mut graph = RuntimeGraph::new(&graph_path, &weights_path);
    graph.init().unwrap();
    graph
        .build(&LayerRegistry::with_builtin_layers(), "input", "output")
        .unwrap();
    let outputs = graph.forward(vec![input_4x4()], false).unwrap();

    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();

    let pooled_sum = 1.0 + 3.0 + 4.0 + 9.0 + 11.0 + 12.0 + 13.0 + 15.0 + 16.0;
    assert_eq!(outputs[0].values(true), vec![pooled_sum + 1.0]);
}

#[test]
fn test_csv_fed_forward() {
    let text = "\
stoat.graph.v1
node graph.Input input
out (1,2,2)
node nn.ReLU relu
in input (1,2,2)
out (1,2,2)
node graph.Output output
in relu (1,2,2)
";
    let (graph_path, weights_path) = write_model("csv", text, &[]);
    let csv_path = std::env::temp_dir().join(format!("stoat-{}-input.csv", std::process::id()));
    fs::write(&csv_path, "-1,2\n3,-4\n").unwrap();

    let batch = stoat_data::CsvLoader::default().load(&csv_path).unwrap();
    let mut graph = RuntimeGraph::new(&graph_path, &weights_path);
    graph.init().unwrap();
    graph
        .build(&LayerRegistry::with_builtin_layers(), "input", "output")
        .unwrap();
    let outputs = graph.forward(vec![Arc::new(batch)], false).unwrap();

    fs::remove_file(&graph_path).ok();
    fs::remove_file(&weights_path).ok();
    fs::remove_file(&csv_path).ok();

    assert_eq!(outputs[0].values(true), vec![0.0, 2.0, 3.0, 0.0]);
}
