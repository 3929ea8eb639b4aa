//! Values carried by sockets and the types that constrain them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Declared type of a socket. Fixed when the socket is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    Text,
    Point,
    Image,
    /// Accepts any value. Only meaningful on input sockets.
    Any,
}

impl ValueType {
    /// Whether a connection from a socket of type `source` into a socket of
    /// this type is allowed.
    pub fn accepts(self, source: ValueType) -> bool {
        self == source
            || self == ValueType::Any
            || (self == ValueType::Number && source == ValueType::Boolean)
    }

    /// Convert `value` so it can be stored in a socket of this type.
    ///
    /// Returns `None` when the value's type is not accepted.
    pub fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (ValueType::Any, v) => Some(v),
            (ValueType::Number, Value::Boolean(b)) => Some(Value::Number(if b { 1.0 } else { 0.0 })),
            (ty, v) if v.value_type() == ty => Some(v),
            _ => None,
        }
    }

    /// Parse a value of this type from its textual form (CLI overrides).
    pub fn parse(self, text: &str) -> Result<Value, String> {
        let text = text.trim();
        match self {
            ValueType::Boolean => text
                .parse::<bool>()
                .map(Value::Boolean)
                .map_err(|_| format!("'{}' is not a boolean", text)),
            ValueType::Number => text
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("'{}' is not a number", text)),
            ValueType::Text => Ok(Value::Text(text.to_string())),
            ValueType::Point => {
                let (x, y) = text
                    .split_once(',')
                    .ok_or_else(|| format!("'{}' is not a point (expected x,y)", text))?;
                let x = x.trim().parse::<f64>().map_err(|_| format!("bad x in '{}'", text))?;
                let y = y.trim().parse::<f64>().map_err(|_| format!("bad y in '{}'", text))?;
                Ok(Value::Point { x, y })
            }
            ValueType::Image => Err("images cannot be given as text".to_string()),
            ValueType::Any => {
                if let Ok(b) = text.parse::<bool>() {
                    Ok(Value::Boolean(b))
                } else if let Ok(n) = text.parse::<f64>() {
                    Ok(Value::Number(n))
                } else {
                    Ok(Value::Text(text.to_string()))
                }
            }
        }
    }

    /// Convert a YAML scalar/mapping into a value of this type.
    pub fn from_yaml(self, yaml: &serde_yaml::Value) -> Result<Value, String> {
        match yaml {
            serde_yaml::Value::Bool(b) => self
                .coerce(Value::Boolean(*b))
                .ok_or_else(|| format!("boolean is not a valid {}", self)),
            serde_yaml::Value::Number(n) => {
                let n = n.as_f64().ok_or_else(|| "number out of range".to_string())?;
                self.coerce(Value::Number(n))
                    .ok_or_else(|| format!("number is not a valid {}", self))
            }
            serde_yaml::Value::String(s) => self.parse(s),
            serde_yaml::Value::Mapping(map) if self == ValueType::Point => {
                let coord = |key: &str| {
                    map.get(key)
                        .and_then(serde_yaml::Value::as_f64)
                        .ok_or_else(|| format!("point is missing numeric '{}'", key))
                };
                Ok(Value::Point {
                    x: coord("x")?,
                    y: coord("y")?,
                })
            }
            other => Err(format!("unsupported {} literal: {:?}", self, other)),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::Text => "text",
            ValueType::Point => "point",
            ValueType::Image => "image",
            ValueType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Single-channel 8-bit image. Pixel storage is shared, so cloning is cheap.
#[derive(Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl Image {
    /// Build an image from row-major pixels. Returns `None` when the buffer
    /// length does not match the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    pub fn filled(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            pixels: Arc::new(vec![level; (width as usize) * (height as usize)]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Mean pixel level, 0.0 for an empty image.
    pub fn mean(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.pixels.iter().map(|&p| p as u64).sum();
        sum as f64 / self.pixels.len() as f64
    }

    /// Apply `f` to every pixel, producing a new image of the same size.
    pub fn map(&self, f: impl Fn(u8) -> u8) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: Arc::new(self.pixels.iter().map(|&p| f(p)).collect()),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({}x{})", self.width, self.height)
    }
}

/// A value stored in a socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Text(String),
    Point { x: f64, y: f64 },
    Image(Image),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::Text,
            Value::Point { .. } => ValueType::Point,
            Value::Image(_) => ValueType::Image,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Equality used for change detection. Unlike `==`, a NaN number is the
    /// same as another NaN, so re-sending it is not a change.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::Point { x: ax, y: ay }, Value::Point { x: bx, y: by }) => {
                same_number(*ax, *bx) && same_number(*ay, *by)
            }
            _ => self == other,
        }
    }

    /// JSON summary for CLI output. Images are reduced to their dimensions
    /// and mean level.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Boolean(b) => serde_json::json!(b),
            Value::Number(n) => serde_json::json!(n),
            Value::Text(s) => serde_json::json!(s),
            Value::Point { x, y } => serde_json::json!({ "x": x, "y": y }),
            Value::Image(image) => serde_json::json!({
                "width": image.width(),
                "height": image.height(),
                "mean": image.mean(),
            }),
        }
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Point { x, y } => write!(f, "({}, {})", x, y),
            Value::Image(image) => write!(
                f,
                "image {}x{} (mean {:.1})",
                image.width(),
                image.height(),
                image.mean()
            ),
        }
    }
}
