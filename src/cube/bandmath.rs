//! Arithmetic on data cubes.
//!
//! On a cube in band math mode (see [`DataCube::band`]) every operation is
//! appended to the reducer callback of the existing `reduce_dimension` node,
//! so `b4 - b8` stays a single reduction. Two reducers are combined under one
//! operator node: nested reducers by reference, flat reducers by relabeling
//! both graphs into one id namespace.
//!
//! Outside band math, scalar operands become an `apply` callback and cube
//! operands a `merge_cubes` with the operator as overlap resolver.

use super::datacube::DataCube;
use super::Callback;
use crate::arguments;
use crate::error::{GraphError, Result};
use crate::graph::{Arguments, FlatGraph, IdGenerator, PGNode, SubGraph, Value};
use serde_json::{Map, Value as Json, json};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;
use tracing::debug;

/// Right hand side of a cube operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Cube(&'a DataCube),
    Scalar(f64),
}

impl<'a> From<&'a DataCube> for Operand<'a> {
    fn from(cube: &'a DataCube) -> Self {
        Operand::Cube(cube)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<i32> for Operand<'_> {
    fn from(value: i32) -> Self {
        Operand::Scalar(value as f64)
    }
}

/// One side of a reducer combination.
enum Term {
    Node(Arc<PGNode>),
    Flat(FlatGraph),
    Scalar(f64),
}

impl From<SubGraph> for Term {
    fn from(graph: SubGraph) -> Self {
        match graph {
            SubGraph::Node(node) => Term::Node(node),
            SubGraph::Flat(graph) => Term::Flat(graph),
        }
    }
}

fn json_literal(argument: &str, value: &Value) -> Result<Json> {
    value
        .literal_json()
        .ok_or_else(|| GraphError::ValueNotRepresentable {
            argument: argument.to_string(),
            value: value.to_string(),
        })
}

fn operator(process_id: &str, x: Value, y: Value) -> PGNode {
    PGNode::with_arguments(process_id, arguments! { "x" => x, "y" => y })
}

fn merge(process_id: &str, x: &FlatGraph, y: &FlatGraph) -> Result<SubGraph> {
    let mut ids = IdGenerator::new();
    Ok(SubGraph::Flat(FlatGraph::merge_binary(
        process_id, x, y, "x", "y", &mut ids,
    )?))
}

/// Appends `process_id(x, y)` to a flat reducer, with the scalar on one side.
fn chain_scalar(
    process_id: &str,
    graph: &FlatGraph,
    scalar: f64,
    reducer_is_x: bool,
) -> Result<SubGraph> {
    let scalar = json_literal(if reducer_is_x { "y" } else { "x" }, &Value::Float(scalar))?;
    let chained = graph.chain(process_id, |previous| {
        let reference = json!({ "from_node": previous });
        let mut arguments = Map::new();
        if reducer_is_x {
            arguments.insert("x".into(), reference);
            arguments.insert("y".into(), scalar);
        } else {
            arguments.insert("x".into(), scalar);
            arguments.insert("y".into(), reference);
        }
        arguments
    })?;
    Ok(SubGraph::Flat(chained))
}

fn combine(process_id: &str, x: Term, y: Term) -> Result<SubGraph> {
    match (x, y) {
        (Term::Flat(a), Term::Flat(b)) => merge(process_id, &a, &b),
        (Term::Flat(a), Term::Node(b)) => merge(process_id, &a, &b.flat_graph()?),
        (Term::Node(a), Term::Flat(b)) => merge(process_id, &a.flat_graph()?, &b),
        (Term::Flat(a), Term::Scalar(s)) => chain_scalar(process_id, &a, s, true),
        (Term::Scalar(s), Term::Flat(b)) => chain_scalar(process_id, &b, s, false),
        (Term::Node(a), Term::Node(b)) => Ok(operator(process_id, a.into(), b.into()).into()),
        (Term::Node(a), Term::Scalar(s)) => Ok(operator(process_id, a.into(), s.into()).into()),
        (Term::Scalar(s), Term::Node(b)) => Ok(operator(process_id, s.into(), b.into()).into()),
        (Term::Scalar(a), Term::Scalar(b)) => Ok(operator(process_id, a.into(), b.into()).into()),
    }
}

impl DataCube {
    fn reducer(&self) -> Result<SubGraph> {
        match self.node.argument("reducer") {
            Some(Value::ProcessGraph(graph)) if self.node.process_id() == "reduce_dimension" => {
                Ok(graph.clone())
            }
            _ => Err(GraphError::NotAReduceNode(self.node.process_id().to_string())),
        }
    }

    fn with_reducer(&self, reducer: SubGraph) -> DataCube {
        DataCube {
            node: Arc::new(self.node.with_argument("reducer", reducer)),
            metadata: self.metadata.clone(),
            band_math: true,
        }
    }

    /// `process_id(x = self, y = other)`, or with swapped sides when `reverse`.
    pub(super) fn binary(
        &self,
        process_id: &str,
        other: Operand<'_>,
        reverse: bool,
    ) -> Result<DataCube> {
        let order = |a: Term, b: Term| if reverse { (b, a) } else { (a, b) };
        match other {
            Operand::Scalar(s) if self.is_band_math() => {
                let (x, y) = order(self.reducer()?.into(), Term::Scalar(s));
                debug!(process_id, "extending band math reducer");
                Ok(self.with_reducer(combine(process_id, x, y)?))
            }
            Operand::Cube(other) if self.is_band_math() && other.is_band_math() => {
                let (x, y) = order(self.reducer()?.into(), other.reducer()?.into());
                debug!(process_id, "combining band math reducers");
                Ok(self.with_reducer(combine(process_id, x, y)?))
            }
            Operand::Scalar(s) => {
                let (x, y) = if reverse {
                    (Value::from(s), Value::FromParameter("x".into()))
                } else {
                    (Value::FromParameter("x".into()), Value::from(s))
                };
                Ok(self.apply(operator(process_id, x, y)))
            }
            Operand::Cube(other) => {
                let resolver = operator(
                    process_id,
                    Value::FromParameter("x".into()),
                    Value::FromParameter("y".into()),
                );
                let (first, second) = if reverse { (other, self) } else { (self, other) };
                Ok(first.merge_cubes(second, Some(Callback::from(resolver))))
            }
        }
    }

    /// `process_id(input = self, ..extra)`.
    pub(super) fn unary(
        &self,
        process_id: &str,
        input: &str,
        extra: Arguments,
    ) -> Result<DataCube> {
        if !self.is_band_math() {
            let mut arguments = arguments! { input => Value::FromParameter("x".into()) };
            arguments.extend(extra);
            return Ok(self.apply(PGNode::with_arguments(process_id, arguments)));
        }
        debug!(process_id, "extending band math reducer");
        let reducer = match self.reducer()? {
            SubGraph::Node(root) => {
                let mut arguments = arguments! { input => root };
                arguments.extend(extra);
                SubGraph::from(PGNode::with_arguments(process_id, arguments))
            }
            SubGraph::Flat(graph) => {
                let mut literals = Map::new();
                for (name, value) in &extra {
                    literals.insert(name.clone(), json_literal(name, value)?);
                }
                SubGraph::Flat(graph.chain(process_id, |previous| {
                    let mut arguments = Map::new();
                    arguments.insert(input.to_string(), json!({ "from_node": previous }));
                    arguments.extend(literals);
                    arguments
                })?)
            }
        };
        Ok(self.with_reducer(reducer))
    }

    pub fn gt<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("gt", other.into(), false)
    }

    pub fn ge<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("gte", other.into(), false)
    }

    pub fn lt<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("lt", other.into(), false)
    }

    pub fn le<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("lte", other.into(), false)
    }

    pub fn equals<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("eq", other.into(), false)
    }

    pub fn not_equals<'a>(&self, other: impl Into<Operand<'a>>) -> Result<DataCube> {
        self.binary("neq", other.into(), false)
    }

    pub fn and(&self, other: &DataCube) -> Result<DataCube> {
        self.binary("and", Operand::Cube(other), false)
    }

    pub fn or(&self, other: &DataCube) -> Result<DataCube> {
        self.binary("or", Operand::Cube(other), false)
    }

    /// `(x - y) / (x + y)` with this cube as `x`.
    pub fn normalized_difference(&self, other: &DataCube) -> Result<DataCube> {
        self.binary("normalized_difference", Operand::Cube(other), false)
    }

    pub fn absolute(&self) -> Result<DataCube> {
        self.unary("absolute", "x", Arguments::new())
    }

    pub fn ln(&self) -> Result<DataCube> {
        self.unary("ln", "x", Arguments::new())
    }

    pub fn log10(&self) -> Result<DataCube> {
        self.unary("log", "x", arguments! { "base" => 10 })
    }

    pub fn sqrt(&self) -> Result<DataCube> {
        self.unary("sqrt", "x", Arguments::new())
    }

    pub fn power(&self, p: f64) -> Result<DataCube> {
        self.unary("power", "base", arguments! { "p" => p })
    }
}

macro_rules! impl_binary_operator {
    ($($trait:ident :: $method:ident => $process:literal),* $(,)?) => {
        $(
            impl $trait<f64> for &DataCube {
                type Output = Result<DataCube>;

                fn $method(self, rhs: f64) -> Self::Output {
                    self.binary($process, Operand::Scalar(rhs), false)
                }
            }

            impl $trait<&DataCube> for &DataCube {
                type Output = Result<DataCube>;

                fn $method(self, rhs: &DataCube) -> Self::Output {
                    self.binary($process, Operand::Cube(rhs), false)
                }
            }

            impl $trait<&DataCube> for f64 {
                type Output = Result<DataCube>;

                fn $method(self, rhs: &DataCube) -> Self::Output {
                    rhs.binary($process, Operand::Scalar(self), true)
                }
            }
        )*
    };
}

impl_binary_operator! {
    Add::add => "add",
    Sub::sub => "subtract",
    Mul::mul => "multiply",
    Div::div => "divide",
}

impl Neg for &DataCube {
    type Output = Result<DataCube>;

    fn neg(self) -> Self::Output {
        self.binary("multiply", Operand::Scalar(-1.0), false)
    }
}
