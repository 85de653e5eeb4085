// IR — the serialized graph format the engine loads
//
// A model is two files: a line-oriented text description of the graph and
// a raw little-endian f32 blob holding every trained weight. The text file
// declares nodes in definition order; edges are given from the consumer
// side (each `in` line names its producer node), and the loader derives
// the producer -> consumer lists from that.
//
//   stoat.graph.v1
//   node graph.Input input
//   out (1,3,32,32)
//   node nn.Conv2d conv1
//   in input (1,3,32,32)
//   out (1,16,30,30)
//   param stride [1,1]
//   attr weight f32 (16,3,3,3) 0 432
//
// `attr` offsets and counts are in f32 elements into the weight blob.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use stoat_core::{bail, DType, Error, Result};

use crate::runtime::{RuntimeAttribute, RuntimeParameter};

const MAGIC: &str = "stoat.graph.v1";

/// An input edge declaration: which node produces it and the tensor shape
/// it arrives with (batch dim first).
#[derive(Debug, Clone)]
pub struct IrOperandDecl {
    pub producer: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

/// One node of the serialized graph.
#[derive(Debug, Clone, Default)]
pub struct IrNode {
    pub name: String,
    pub type_name: String,
    pub inputs: Vec<IrOperandDecl>,
    pub output_shape: Option<Vec<usize>>,
    pub params: HashMap<String, RuntimeParameter>,
    pub attrs: HashMap<String, RuntimeAttribute>,
}

impl IrNode {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        IrNode {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }
}

/// Load a graph description and its weight blob from disk.
pub fn load_graph(ir_path: impl AsRef<Path>, weights_path: impl AsRef<Path>) -> Result<Vec<IrNode>> {
    let text = fs::read_to_string(ir_path.as_ref())?;
    // The blob is read lazily; weight-free graphs need no weights file.
    let mut weights: Option<Vec<u8>> = None;
    let weights_path = weights_path.as_ref();

    let mut nodes: Vec<IrNode> = Vec::new();
    let mut saw_magic = false;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !saw_magic {
            if line != MAGIC {
                bail!("bad magic {:?} in {:?}", line, ir_path.as_ref());
            }
            saw_magic = true;
            continue;
        }

        let mut fields = line.split_whitespace();
        let keyword = fields.next().unwrap_or("");
        match keyword {
            "node" => {
                let type_name = next_field(&mut fields, lineno, "node type")?;
                let name = next_field(&mut fields, lineno, "node name")?;
                nodes.push(IrNode::new(name, type_name));
            }
            "in" => {
                let node = current(&mut nodes, lineno)?;
                let producer = next_field(&mut fields, lineno, "producer name")?;
                let shape = parse_shape(&next_field(&mut fields, lineno, "input shape")?, lineno)?;
                node.inputs.push(IrOperandDecl {
                    producer,
                    shape,
                    dtype: DType::F32,
                });
            }
            "out" => {
                let node = current(&mut nodes, lineno)?;
                let shape = parse_shape(&next_field(&mut fields, lineno, "output shape")?, lineno)?;
                node.output_shape = Some(shape);
            }
            "param" => {
                let node = current(&mut nodes, lineno)?;
                let name = next_field(&mut fields, lineno, "param name")?;
                let rest = fields.collect::<Vec<_>>().join(" ");
                if rest.is_empty() {
                    bail!("line {}: param {:?} has no value", lineno + 1, name);
                }
                node.params.insert(name, parse_param_value(&rest));
            }
            "attr" => {
                let node = current(&mut nodes, lineno)?;
                let name = next_field(&mut fields, lineno, "attr name")?;
                let tag = next_field(&mut fields, lineno, "attr dtype")?;
                let dtype = match DType::from_str_tag(&tag) {
                    Some(DType::F32) => DType::F32,
                    _ => bail!("line {}: unsupported attr dtype {:?}", lineno + 1, tag),
                };
                let shape = parse_shape(&next_field(&mut fields, lineno, "attr shape")?, lineno)?;
                let offset: usize = parse_num(&next_field(&mut fields, lineno, "attr offset")?, lineno)?;
                let count: usize = parse_num(&next_field(&mut fields, lineno, "attr count")?, lineno)?;

                if weights.is_none() {
                    weights = Some(fs::read(weights_path)?);
                }
                let blob: &[u8] = weights.as_deref().unwrap_or(&[]);
                let start = offset * 4;
                let end = start + count * 4;
                if end > blob.len() {
                    bail!(
                        "line {}: attr {:?} spans bytes {}..{} but weight blob is {} bytes",
                        lineno + 1,
                        name,
                        start,
                        end,
                        blob.len()
                    );
                }
                node.attrs.insert(
                    name,
                    RuntimeAttribute {
                        data: blob[start..end].to_vec(),
                        shape,
                        dtype,
                    },
                );
            }
            other => bail!("line {}: unknown keyword {:?}", lineno + 1, other),
        }
    }

    if !saw_magic {
        bail!("empty graph file {:?}", ir_path.as_ref());
    }
    Ok(nodes)
}

fn current<'a>(nodes: &'a mut Vec<IrNode>, lineno: usize) -> Result<&'a mut IrNode> {
    match nodes.last_mut() {
        Some(n) => Ok(n),
        None => Err(Error::msg(format!(
            "line {}: declaration before any `node` line",
            lineno + 1
        ))),
    }
}

fn next_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    lineno: usize,
    what: &str,
) -> Result<String> {
    match fields.next() {
        Some(f) => Ok(f.to_string()),
        None => Err(Error::msg(format!("line {}: missing {}", lineno + 1, what))),
    }
}

fn parse_num(s: &str, lineno: usize) -> Result<usize> {
    s.parse()
        .map_err(|_| Error::msg(format!("line {}: bad number {:?}", lineno + 1, s)))
}

/// Parse a `(d0,d1,...)` shape list.
fn parse_shape(s: &str, lineno: usize) -> Result<Vec<usize>> {
    let inner = s
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| Error::msg(format!("line {}: bad shape {:?}", lineno + 1, s)))?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|d| parse_num(d.trim(), lineno))
        .collect()
}

/// Infer a param value from its textual form. Anything that is not a bool,
/// a number, or a bracketed array falls back to a string.
fn parse_param_value(s: &str) -> RuntimeParameter {
    let s = s.trim();
    match s {
        "true" => return RuntimeParameter::Bool(true),
        "false" => return RuntimeParameter::Bool(false),
        _ => {}
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let items: Vec<&str> = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(str::trim).collect()
        };
        if items.iter().all(|i| i.parse::<i32>().is_ok()) {
            let ints = items.iter().map(|i| i.parse().unwrap_or(0)).collect();
            return RuntimeParameter::IntArray(ints);
        }
        if items.iter().all(|i| i.parse::<f32>().is_ok()) {
            let floats = items.iter().map(|i| i.parse().unwrap_or(0.0)).collect();
            return RuntimeParameter::FloatArray(floats);
        }
        let strs = items
            .iter()
            .map(|i| i.trim_matches('"').to_string())
            .collect();
        return RuntimeParameter::StringArray(strs);
    }
    if let Ok(i) = s.parse::<i32>() {
        return RuntimeParameter::Int(i);
    }
    if let Ok(f) = s.parse::<f32>() {
        return RuntimeParameter::Float(f);
    }
    RuntimeParameter::String(s.trim_matches('"').to_string())
}
