use serde::{Deserialize, Serialize};

/// A single neuron: one weight per input of its layer, plus a bias.
///
/// Immutable after creation except by being replaced wholesale when a genome
/// is unflattened back into a brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub weights: Vec<f32>,
    pub bias: f32,
}

/// An ordered group of neurons sharing the same input count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub neurons: Vec<Neuron>,
}

impl Layer {
    /// Number of outputs this layer produces (one per neuron).
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.neurons.len()
    }

    /// Number of inputs every neuron of this layer consumes.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.neurons.first().map_or(0, |n| n.weights.len())
    }
}

/// A feed-forward network dedicated to one behavioral concern of one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brain {
    pub layers: Vec<Layer>,
}

impl Brain {
    /// Output arity of the final layer, 0 for an empty brain.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.layers.last().map_or(0, Layer::output_count)
    }
}

/// Flattened weight+bias vector of one brain instance, carrying a fitness
/// score accumulated by the fitness shaper over a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub genes: Vec<f32>,
    pub fitness: f32,
}

impl Genome {
    #[must_use]
    pub fn new(genes: Vec<f32>) -> Self {
        Self {
            genes,
            fitness: 0.0,
        }
    }
}
