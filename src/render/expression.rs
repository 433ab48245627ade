//! Data-driven style expressions
//!
//! A small subset of the expression language map renderers accept for paint properties
//! and layer filters. Expressions serialize to the renderer's array form
//! (`["interpolate", ["linear"], ["zoom"], ...]`) and can be evaluated locally, which is
//! how the headless renderer and the tests check what a layer would draw.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Feature property lookup
    Get(String),
    /// Feature property presence
    Has(String),
    /// Current camera zoom
    Zoom,
    Not(Box<Expression>),
    Eq(Box<Expression>, Box<Expression>),
    All(Vec<Expression>),
    /// Linear interpolation of numeric outputs over numeric stops, clamped at both ends
    Interpolate {
        input: Box<Expression>,
        stops: Vec<(f64, f64)>,
    },
    /// Piecewise-constant output: `base` below the first stop, then each stop's output
    /// from its threshold upwards
    Step {
        input: Box<Expression>,
        base: Box<Expression>,
        stops: Vec<(f64, Expression)>,
    },
    Match {
        input: Box<Expression>,
        arms: Vec<(Value, Expression)>,
        fallback: Box<Expression>,
    },
}

/// Inputs available to an expression while it is evaluated
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub zoom: f64,
    pub properties: Option<&'a Map<String, Value>>,
}

impl<'a> EvalContext<'a> {
    pub fn at_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: &'a Map<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn get(key: impl Into<String>) -> Self {
        Expression::Get(key.into())
    }

    pub fn has(key: impl Into<String>) -> Self {
        Expression::Has(key.into())
    }

    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Expression::Eq(Box::new(left), Box::new(right))
    }

    /// `["==", ["get", key], value]`
    pub fn property_equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::eq(Self::get(key), Self::literal(value))
    }

    pub fn interpolate_zoom(stops: Vec<(f64, f64)>) -> Self {
        Expression::Interpolate {
            input: Box::new(Expression::Zoom),
            stops,
        }
    }

    pub fn step(input: Expression, base: Expression, stops: Vec<(f64, Expression)>) -> Self {
        Expression::Step {
            input: Box::new(input),
            base: Box::new(base),
            stops,
        }
    }

    pub fn match_on(
        input: Expression,
        arms: Vec<(Value, Expression)>,
        fallback: Expression,
    ) -> Self {
        Expression::Match {
            input: Box::new(input),
            arms,
            fallback: Box::new(fallback),
        }
    }

    /// Renders the expression in the renderer's JSON array form
    pub fn to_json(&self) -> Value {
        match self {
            Expression::Literal(value) => match value {
                Value::Array(_) | Value::Object(_) => json!(["literal", value]),
                other => other.clone(),
            },
            Expression::Get(key) => json!(["get", key]),
            Expression::Has(key) => json!(["has", key]),
            Expression::Zoom => json!(["zoom"]),
            Expression::Not(inner) => json!(["!", inner.to_json()]),
            Expression::Eq(left, right) => json!(["==", left.to_json(), right.to_json()]),
            Expression::All(parts) => {
                let mut out = vec![json!("all")];
                out.extend(parts.iter().map(Expression::to_json));
                Value::Array(out)
            }
            Expression::Interpolate { input, stops } => {
                let mut out = vec![json!("interpolate"), json!(["linear"]), input.to_json()];
                for (stop, value) in stops {
                    out.push(json!(stop));
                    out.push(json!(value));
                }
                Value::Array(out)
            }
            Expression::Step { input, base, stops } => {
                let mut out = vec![json!("step"), input.to_json(), base.to_json()];
                for (threshold, output) in stops {
                    out.push(json!(threshold));
                    out.push(output.to_json());
                }
                Value::Array(out)
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let mut out = vec![json!("match"), input.to_json()];
                for (label, output) in arms {
                    out.push(label.clone());
                    out.push(output.to_json());
                }
                out.push(fallback.to_json());
                Value::Array(out)
            }
        }
    }

    /// Evaluates the expression against a zoom level and optional feature properties
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::Get(key) => ctx
                .properties
                .and_then(|props| props.get(key))
                .cloned()
                .unwrap_or(Value::Null),
            Expression::Has(key) => {
                Value::Bool(ctx.properties.map_or(false, |props| props.contains_key(key)))
            }
            Expression::Zoom => Value::from(ctx.zoom),
            Expression::Not(inner) => Value::Bool(!truthy(&inner.evaluate(ctx))),
            Expression::Eq(left, right) => {
                Value::Bool(values_equal(&left.evaluate(ctx), &right.evaluate(ctx)))
            }
            Expression::All(parts) => Value::Bool(parts.iter().all(|p| truthy(&p.evaluate(ctx)))),
            Expression::Interpolate { input, stops } => {
                match input.evaluate(ctx).as_f64() {
                    Some(x) => interpolate_linear(stops, x).map_or(Value::Null, Value::from),
                    None => Value::Null,
                }
            }
            Expression::Step { input, base, stops } => {
                let Some(x) = input.evaluate(ctx).as_f64() else {
                    return base.evaluate(ctx);
                };
                let mut output = base.as_ref();
                for (threshold, stop_output) in stops {
                    if x >= *threshold {
                        output = stop_output;
                    } else {
                        break;
                    }
                }
                output.evaluate(ctx)
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let value = input.evaluate(ctx);
                arms.iter()
                    .find(|(label, _)| values_equal(label, &value))
                    .map(|(_, output)| output.evaluate(ctx))
                    .unwrap_or_else(|| fallback.evaluate(ctx))
            }
        }
    }

    pub fn evaluate_f64(&self, ctx: &EvalContext<'_>) -> Option<f64> {
        self.evaluate(ctx).as_f64()
    }

    /// Whether a filter expression accepts a feature
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        truthy(&self.evaluate(ctx))
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Piecewise-linear interpolation over `(input, output)` stops, clamped outside the range
pub fn interpolate_linear(stops: &[(f64, f64)], x: f64) -> Option<f64> {
    let (first, last) = (stops.first()?, stops.last()?);
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    stops.windows(2).find_map(|pair| {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        if x >= x0 && x <= x1 {
            let span = x1 - x0;
            if span <= f64::EPSILON {
                Some(y1)
            } else {
                Some(y0 + (y1 - y0) * (x - x0) / span)
            }
        } else {
            None
        }
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => left == right,
    }
}
