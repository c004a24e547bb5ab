//! Genome <-> brain weight mapping.
//!
//! A genome's gene sequence is the concatenation, layer by layer and neuron
//! by neuron in canonical order, of each neuron's weights followed by its
//! bias. `unflatten(flatten(brain))` reproduces the exact structure.

use crate::brain::topology::BrainTopology;
use crate::error::CoreError;
use vivarium_data::{Brain, Genome, Layer, Neuron};

/// Flattens a brain into its canonical gene vector.
#[must_use]
pub fn flatten(brain: &Brain) -> Vec<f32> {
    let mut genes = Vec::new();
    for layer in &brain.layers {
        for neuron in &layer.neurons {
            genes.extend_from_slice(&neuron.weights);
            genes.push(neuron.bias);
        }
    }
    genes
}

/// Rebuilds a brain of the given topology from a gene vector. Fails when the
/// gene count does not match the topology exactly.
pub fn unflatten(genes: &[f32], topology: &BrainTopology) -> Result<Brain, CoreError> {
    let expected = topology.gene_count();
    if genes.len() != expected {
        return Err(CoreError::GenomeShape {
            expected,
            got: genes.len(),
        });
    }

    let mut cursor = 0;
    let mut inputs = topology.input_count;
    let mut layers = Vec::with_capacity(topology.layer_sizes.len());
    for &size in &topology.layer_sizes {
        let mut neurons = Vec::with_capacity(size);
        for _ in 0..size {
            let weights = genes[cursor..cursor + inputs].to_vec();
            cursor += inputs;
            let bias = genes[cursor];
            cursor += 1;
            neurons.push(Neuron { weights, bias });
        }
        layers.push(Layer { neurons });
        inputs = size;
    }
    Ok(Brain { layers })
}

/// Convenience: flattens a brain into a genome carrying the given fitness.
#[must_use]
pub fn to_genome(brain: &Brain, fitness: f32) -> Genome {
    Genome {
        genes: flatten(brain),
        fitness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_round_trip_is_lossless() {
        let topology = BrainTopology::new(4, vec![6, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let brain = topology.build_random_with_rng(&mut rng);

        let genes = flatten(&brain);
        assert_eq!(genes.len(), topology.gene_count());
        let rebuilt = unflatten(&genes, &topology).expect("shape matches");
        assert_eq!(rebuilt, brain);
        assert_eq!(flatten(&rebuilt), genes);
    }

    #[test]
    fn test_canonical_gene_order() {
        let brain = Brain {
            layers: vec![Layer {
                neurons: vec![
                    Neuron {
                        weights: vec![1.0, 2.0],
                        bias: 3.0,
                    },
                    Neuron {
                        weights: vec![4.0, 5.0],
                        bias: 6.0,
                    },
                ],
            }],
        };
        assert_eq!(flatten(&brain), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let topology = BrainTopology::new(2, vec![2]);
        let result = unflatten(&[0.0; 5], &topology);
        assert!(matches!(
            result,
            Err(CoreError::GenomeShape {
                expected: 6,
                got: 5
            })
        ));
    }
}
