use crate::error::CoreError;
use rayon::prelude::*;
use vivarium_data::{Brain, Layer, Neuron};

fn activate(neuron: &Neuron, inputs: &[f32]) -> f32 {
    let sum: f32 = neuron
        .weights
        .iter()
        .zip(inputs)
        .map(|(w, x)| w * x)
        .sum::<f32>()
        + neuron.bias;
    sum.tanh()
}

/// Evaluates one layer. Neurons within a layer are independent and computed
/// in parallel; the tanh activation bounds every output to (-1, 1).
pub fn forward_layer(layer: &Layer, inputs: &[f32]) -> Result<Vec<f32>, CoreError> {
    let expected = layer.input_count();
    if inputs.len() != expected {
        return Err(CoreError::InputArity {
            expected,
            got: inputs.len(),
        });
    }
    Ok(layer
        .neurons
        .par_iter()
        .map(|n| activate(n, inputs))
        .collect())
}

/// One full feed-forward pass. Layers are evaluated strictly in order (each
/// depends on the previous one's outputs); no shared mutable state is
/// touched, so distinct brains may be evaluated concurrently.
pub fn forward(brain: &Brain, inputs: &[f32]) -> Result<Vec<f32>, CoreError> {
    let mut values = inputs.to_vec();
    for layer in &brain.layers {
        values = forward_layer(layer, &values)?;
    }
    Ok(values)
}
