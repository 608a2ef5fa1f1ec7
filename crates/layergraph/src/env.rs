use std::env;
use std::sync::OnceLock;

use crate::tensor::DType;

static LAYERGRAPH_FLOATX: OnceLock<DType> = OnceLock::new();

fn parse_float_dtype(value: &str) -> Option<DType> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "float32" | "f32" => Some(DType::F32),
        "float64" | "f64" => Some(DType::F64),
        _ => None,
    }
}

/// Default floating-point dtype parameters and constants are normalized to.
///
/// Read once from `LAYERGRAPH_FLOATX` (`float32` or `float64`); anything else falls back to
/// `float32`.
pub fn float_x() -> DType {
    *LAYERGRAPH_FLOATX.get_or_init(|| match env::var("LAYERGRAPH_FLOATX") {
        Ok(value) if !value.trim().is_empty() => match parse_float_dtype(&value) {
            Some(dtype) => dtype,
            None => {
                log::warn!("ignoring unsupported LAYERGRAPH_FLOATX value '{value}'");
                DType::F32
            }
        },
        _ => DType::F32,
    })
}
