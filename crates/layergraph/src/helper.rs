//! Network-wide parameter aggregation over [`get_all_layers`].

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::graph::get_all_layers;
use crate::layer::Node;
use crate::params::{Param, TagFilter};
use crate::tensor::HostTensor;

/// Parameters of every layer feeding `sinks` that match `filter`, in layer order and then
/// registration order.
pub fn get_all_params<B: SymbolicBackend>(
    sinks: impl AsRef<[Node<B>]>,
    filter: &TagFilter,
) -> Vec<Param<B>> {
    get_all_layers(sinks)
        .iter()
        .flat_map(|layer| layer.get_params(filter))
        .collect()
}

/// Total number of scalar elements across [`get_all_params`].
pub fn count_params<B: SymbolicBackend>(sinks: impl AsRef<[Node<B>]>, filter: &TagFilter) -> usize {
    get_all_params(sinks, filter)
        .iter()
        .map(Param::num_elements)
        .sum()
}

/// Snapshot of the current values of [`get_all_params`], in the same order.
pub fn get_all_param_values<B: SymbolicBackend>(
    sinks: impl AsRef<[Node<B>]>,
    filter: &TagFilter,
) -> LayerResult<Vec<HostTensor>> {
    get_all_params(sinks, filter)
        .iter()
        .map(Param::get_value)
        .collect()
}

/// Assigns `values` positionally to [`get_all_params`].
///
/// Nothing is written unless exactly one value per parameter is supplied.
pub fn set_all_param_values<B: SymbolicBackend>(
    sinks: impl AsRef<[Node<B>]>,
    values: Vec<HostTensor>,
    filter: &TagFilter,
) -> LayerResult<()> {
    let params = get_all_params(sinks, filter);
    if params.len() != values.len() {
        return Err(LayerError::ValueCountMismatch {
            expected: params.len(),
            found: values.len(),
        });
    }
    log::debug!("assigning values to {} parameters", params.len());
    for (param, value) in params.iter().zip(values) {
        param.set_value(value)?;
    }
    Ok(())
}
