use rand::Rng;
use serde::{Deserialize, Serialize};
use vivarium_data::Genome;

/// Recombination strategy applied when breeding two parents.
///
/// `Uniform` is the strategy the epoch path exercises; the pivot variants
/// carry per-gene mutation and are kept as selectable alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverStrategy {
    /// Per gene index, 50% chance of swapping which parent contributes to
    /// which child. No mutation.
    Uniform,
    /// One pivot point; tails swapped, then per-gene mutation.
    SinglePivot,
    /// Two pivot points; middle segment swapped, then per-gene mutation.
    DoublePivot,
}

impl CrossoverStrategy {
    /// Breeds two children from two parents.
    pub fn breed_with_rng<R: Rng>(
        self,
        a: &Genome,
        b: &Genome,
        mutation_rate: f32,
        mutation_amount: f32,
        rng: &mut R,
    ) -> (Genome, Genome) {
        match self {
            CrossoverStrategy::Uniform => uniform_with_rng(a, b, rng),
            CrossoverStrategy::SinglePivot => {
                single_pivot_with_rng(a, b, mutation_rate, mutation_amount, rng)
            }
            CrossoverStrategy::DoublePivot => {
                double_pivot_with_rng(a, b, mutation_rate, mutation_amount, rng)
            }
        }
    }
}

/// Uniform crossover: for each gene index, with 50% probability swap which
/// parent contributes to which child. Children start with zero fitness.
pub fn uniform_with_rng<R: Rng>(a: &Genome, b: &Genome, rng: &mut R) -> (Genome, Genome) {
    let mut c1 = a.genes.clone();
    let mut c2 = b.genes.clone();
    let len = c1.len().min(c2.len());
    for i in 0..len {
        if rng.gen_bool(0.5) {
            std::mem::swap(&mut c1[i], &mut c2[i]);
        }
    }
    (Genome::new(c1), Genome::new(c2))
}

/// Single-pivot crossover with per-gene mutation.
pub fn single_pivot_with_rng<R: Rng>(
    a: &Genome,
    b: &Genome,
    mutation_rate: f32,
    mutation_amount: f32,
    rng: &mut R,
) -> (Genome, Genome) {
    let mut c1 = a.genes.clone();
    let mut c2 = b.genes.clone();
    let len = c1.len().min(c2.len());
    if len > 1 {
        let pivot = rng.gen_range(1..len);
        for i in pivot..len {
            std::mem::swap(&mut c1[i], &mut c2[i]);
        }
    }
    mutate_genes(&mut c1, mutation_rate, mutation_amount, rng);
    mutate_genes(&mut c2, mutation_rate, mutation_amount, rng);
    (Genome::new(c1), Genome::new(c2))
}

/// Double-pivot crossover with per-gene mutation.
pub fn double_pivot_with_rng<R: Rng>(
    a: &Genome,
    b: &Genome,
    mutation_rate: f32,
    mutation_amount: f32,
    rng: &mut R,
) -> (Genome, Genome) {
    let mut c1 = a.genes.clone();
    let mut c2 = b.genes.clone();
    let len = c1.len().min(c2.len());
    if len > 2 {
        let first = rng.gen_range(1..len - 1);
        let second = rng.gen_range(first..len);
        for i in first..second {
            std::mem::swap(&mut c1[i], &mut c2[i]);
        }
    }
    mutate_genes(&mut c1, mutation_rate, mutation_amount, rng);
    mutate_genes(&mut c2, mutation_rate, mutation_amount, rng);
    (Genome::new(c1), Genome::new(c2))
}

fn mutate_genes<R: Rng>(genes: &mut [f32], rate: f32, amount: f32, rng: &mut R) {
    if rate <= 0.0 || amount <= 0.0 {
        return;
    }
    for gene in genes {
        if rng.gen::<f32>() < rate {
            *gene += rng.gen_range(-amount..amount);
        }
    }
}
