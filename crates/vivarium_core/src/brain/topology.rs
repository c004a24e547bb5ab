use rand::Rng;
use vivarium_data::{Brain, Layer, Neuron};

/// Declared shape of one (species, brain) network: input arity plus the
/// neuron count of each layer. The last layer's size is the declared output
/// arity the evaluator checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrainTopology {
    pub input_count: usize,
    pub layer_sizes: Vec<usize>,
}

impl BrainTopology {
    #[must_use]
    pub fn new(input_count: usize, layer_sizes: Vec<usize>) -> Self {
        Self {
            input_count,
            layer_sizes,
        }
    }

    /// Declared output arity (neuron count of the final layer).
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.layer_sizes.last().copied().unwrap_or(0)
    }

    /// Total gene count of a flattened brain of this shape: per neuron, one
    /// weight per layer input plus one bias.
    #[must_use]
    pub fn gene_count(&self) -> usize {
        let mut inputs = self.input_count;
        let mut total = 0;
        for &size in &self.layer_sizes {
            total += size * (inputs + 1);
            inputs = size;
        }
        total
    }

    /// Builds a brain of this shape with weights and biases drawn uniformly
    /// from [-1, 1).
    pub fn build_random_with_rng<R: Rng>(&self, rng: &mut R) -> Brain {
        let mut inputs = self.input_count;
        let mut layers = Vec::with_capacity(self.layer_sizes.len());
        for &size in &self.layer_sizes {
            let neurons = (0..size)
                .map(|_| Neuron {
                    weights: (0..inputs).map(|_| rng.gen_range(-1.0..1.0)).collect(),
                    bias: rng.gen_range(-1.0..1.0),
                })
                .collect();
            layers.push(Layer { neurons });
            inputs = size;
        }
        Brain { layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_gene_count_matches_structure() {
        // 4 inputs -> 6 neurons -> 2 neurons
        let topology = BrainTopology::new(4, vec![6, 2]);
        // 6*(4+1) + 2*(6+1) = 30 + 14
        assert_eq!(topology.gene_count(), 44);
        assert_eq!(topology.output_count(), 2);
    }

    #[test]
    fn test_random_brain_has_declared_shape() {
        let topology = BrainTopology::new(3, vec![5, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let brain = topology.build_random_with_rng(&mut rng);
        assert_eq!(brain.layers.len(), 2);
        assert_eq!(brain.layers[0].neurons.len(), 5);
        assert_eq!(brain.layers[0].input_count(), 3);
        assert_eq!(brain.layers[1].input_count(), 5);
        assert_eq!(brain.output_count(), 2);
        for layer in &brain.layers {
            for neuron in &layer.neurons {
                assert!(neuron.bias >= -1.0 && neuron.bias < 1.0);
                assert!(neuron.weights.iter().all(|w| (-1.0..1.0).contains(w)));
            }
        }
    }
}
