//! Grayscale image operations

use crate::core::{
    error::OperationError,
    operation::{Operation, OperationDescription, OperationInputs},
    socket::SocketHint,
    value::{Image, Value, ValueType},
};
use crate::operations::OperationRegistry;

pub fn register(registry: &mut OperationRegistry) {
    registry.register(|| Box::new(Checkerboard::new()));
    registry.register(|| Box::new(Threshold::new()));
    registry.register(|| Box::new(Invert::new()));
    registry.register(|| Box::new(BoxBlur::new()));
    registry.register(|| Box::new(MeanIntensity::new()));
}

/// Clamp a number input into a valid pixel level
fn level(name: &str, value: f64) -> Result<u8, OperationError> {
    if !(0.0..=255.0).contains(&value) {
        return Err(OperationError::invalid_input(
            name,
            format!("{} is outside 0..=255", value),
        ));
    }
    Ok(value.round() as u8)
}

/// Validate a positive integral dimension
fn dimension(name: &str, value: f64, max: u32) -> Result<u32, OperationError> {
    if value < 1.0 || value > max as f64 || value.fract() != 0.0 {
        return Err(OperationError::invalid_input(
            name,
            format!("{} is not an integer in 1..={}", value, max),
        ));
    }
    Ok(value as u32)
}

/// Source: a square checkerboard pattern
pub struct Checkerboard {
    description: OperationDescription,
}

impl Checkerboard {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("checkerboard", "Square black and white checkerboard")
                .input(SocketHint::optional("size", ValueType::Number))
                .input(SocketHint::optional("cell", ValueType::Number))
                .output(SocketHint::new("image", ValueType::Image)),
        }
    }
}

impl Default for Checkerboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Checkerboard {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        let size = dimension("size", inputs.optional_number(0)?.unwrap_or(64.0), 4096)?;
        let cell = dimension("cell", inputs.optional_number(1)?.unwrap_or(8.0), size)?;

        let mut pixels = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                let white = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.push(if white { 255 } else { 0 });
            }
        }
        let image = Image::new(size, size, pixels)
            .ok_or_else(|| OperationError::failed("checkerboard buffer size mismatch"))?;
        Ok(vec![Value::Image(image)])
    }
}

/// Binary threshold: pixels at or above the level become 255, others 0
pub struct Threshold {
    description: OperationDescription,
}

impl Threshold {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("threshold", "Binary threshold at a level")
                .input(SocketHint::new("image", ValueType::Image))
                .input(SocketHint::new("level", ValueType::Number))
                .output(SocketHint::new("image", ValueType::Image)),
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Threshold {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        let image = inputs.image(0)?;
        let cut = level("level", inputs.number(1)?)?;
        Ok(vec![Value::Image(
            image.map(|p| if p >= cut { 255 } else { 0 }),
        )])
    }
}

pub struct Invert {
    description: OperationDescription,
}

impl Invert {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("invert", "Invert every pixel")
                .input(SocketHint::new("image", ValueType::Image))
                .output(SocketHint::new("image", ValueType::Image)),
        }
    }
}

impl Default for Invert {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Invert {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        Ok(vec![Value::Image(inputs.image(0)?.map(|p| 255 - p))])
    }
}

/// Mean filter over a (2r+1)² window, clamped at the borders
pub struct BoxBlur {
    description: OperationDescription,
}

impl BoxBlur {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("box_blur", "Mean filter with a square window")
                .input(SocketHint::new("image", ValueType::Image))
                .input(SocketHint::optional("radius", ValueType::Number))
                .output(SocketHint::new("image", ValueType::Image)),
        }
    }
}

impl Default for BoxBlur {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for BoxBlur {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        let image = inputs.image(0)?;
        let radius = dimension("radius", inputs.optional_number(1)?.unwrap_or(1.0), 64)? as i64;
        let (width, height) = (image.width() as i64, image.height() as i64);

        let mut pixels = Vec::with_capacity(image.pixels().len());
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0u64;
                let mut count = 0u64;
                for wy in (y - radius).max(0)..=(y + radius).min(height - 1) {
                    for wx in (x - radius).max(0)..=(x + radius).min(width - 1) {
                        sum += image.get(wx as u32, wy as u32) as u64;
                        count += 1;
                    }
                }
                pixels.push((sum as f64 / count as f64).round() as u8);
            }
        }
        let blurred = Image::new(image.width(), image.height(), pixels)
            .ok_or_else(|| OperationError::failed("blur buffer size mismatch"))?;
        Ok(vec![Value::Image(blurred)])
    }
}

pub struct MeanIntensity {
    description: OperationDescription,
}

impl MeanIntensity {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("mean_intensity", "Mean pixel level of an image")
                .input(SocketHint::new("image", ValueType::Image))
                .output(SocketHint::new("mean", ValueType::Number)),
        }
    }
}

impl Default for MeanIntensity {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for MeanIntensity {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        Ok(vec![Value::Number(inputs.image(0)?.mean())])
    }
}
