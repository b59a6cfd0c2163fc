//! # Genetic Seeding
//!
//! Stochastic search that hands the refinement phase a starting point away
//! from the trivial single-asset corners.
//!
//! - population: `N` random include/exclude allocations plus `N` single-asset ones
//! - cull to about `sqrt(N)` survivors, half elite and half random from the rest
//! - uniform crossover with per-gene mutation, renormalised to the simplex

use std::time::Instant;

use ordered_float::OrderedFloat;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;
use tracing::info;

use super::scorer::AllocationScorer;
use super::types::Allocation;
use super::types::ScoredAllocation;
use super::types::SeedSummary;
use super::types::StopReason;
use crate::config::SeedConfig;
use crate::error::Result;

/// Runs the seeding phase against one scorer.
pub struct GeneticSeeder<'a> {
  scorer: &'a AllocationScorer,
  config: &'a SeedConfig,
  rng: StdRng,
}

impl<'a> GeneticSeeder<'a> {
  pub fn new(scorer: &'a AllocationScorer, config: &'a SeedConfig) -> Self {
    let rng = match config.rng_seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };
    Self {
      scorer,
      config,
      rng,
    }
  }

  /// Evolve until `N²` evaluations and the minimum duration are both reached,
  /// or the time budget runs out. Returns the top individual, if any
  /// candidate was scorable.
  pub fn run(mut self) -> Result<(Option<ScoredAllocation>, SeedSummary)> {
    let start = Instant::now();
    let n = self.scorer.n_assets();
    let target = n * n;
    let population_size = 2 * n;
    let keep = ((n as f64).sqrt().ceil() as usize).max(2);

    let mut evaluations = 0;
    let mut generations = 0;
    let mut population: Vec<ScoredAllocation> = Vec::with_capacity(population_size);

    for _ in 0..n {
      let candidate = self.random_binary(n);
      evaluations += 1;
      if let Some(s) = self.scorer.evaluate(&candidate)? {
        population.push(s);
      }
    }
    for i in 0..n {
      evaluations += 1;
      if let Some(s) = self.scorer.evaluate(&Allocation::single(n, i))? {
        population.push(s);
      }
    }

    let stop = loop {
      let elapsed = start.elapsed();
      if elapsed >= self.config.time_budget {
        info!(?elapsed, evaluations, "seed phase time budget exhausted");
        break StopReason::TimeBudget;
      }
      if n < 2 || (evaluations >= target && elapsed >= self.config.min_duration) {
        break StopReason::Converged;
      }

      self.cull(&mut population, keep);

      let parents = population.len();
      for _ in parents..population_size {
        let child = if parents >= 2 {
          self.breed(&population[..parents])
        } else {
          self.random_binary(n)
        };
        evaluations += 1;
        if let Some(s) = self.scorer.evaluate(&child)? {
          population.push(s);
        }
      }

      generations += 1;
      debug!(
        generation = generations,
        evaluations,
        best = population
          .iter()
          .map(|s| s.score())
          .fold(f64::NEG_INFINITY, f64::max),
        "seed generation"
      );
    };

    let best = population
      .into_iter()
      .max_by_key(|s| OrderedFloat(s.score()));

    let summary = SeedSummary {
      evaluations,
      generations,
      best_score: best.as_ref().map(|s| s.score()),
      stop,
    };
    info!(
      evaluations,
      generations,
      best = ?summary.best_score,
      "seed phase finished"
    );
    Ok((best, summary))
  }

  /// Each asset in or out with equal odds, renormalised; empty draws are redrawn.
  fn random_binary(&mut self, n: usize) -> Allocation {
    loop {
      let genes: Vec<f64> = (0..n)
        .map(|_| if self.rng.random_bool(0.5) { 1.0 } else { 0.0 })
        .collect();
      if let Some(a) = Allocation::normalized(&genes) {
        return a;
      }
    }
  }

  /// Keep the best half of `keep` slots and fill the rest at random from
  /// the lower tier.
  fn cull(&mut self, population: &mut Vec<ScoredAllocation>, keep: usize) {
    if population.len() <= keep {
      return;
    }
    population.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.score())));

    let elite = keep.div_ceil(2);
    population[elite..].shuffle(&mut self.rng);
    population.truncate(keep);
  }

  /// Uniform crossover of two distinct parents with per-gene mutation.
  fn breed(&mut self, parents: &[ScoredAllocation]) -> Allocation {
    loop {
      let i = self.rng.random_range(0..parents.len());
      let mut j = self.rng.random_range(0..parents.len() - 1);
      if j >= i {
        j += 1;
      }
      let (a, b) = (parents[i].weights(), parents[j].weights());

      let genes: Vec<f64> = a
        .iter()
        .zip(b)
        .map(|(&wa, &wb)| {
          if self.rng.random_bool(self.config.mutation_rate) {
            self.rng.random::<f64>()
          } else if self.rng.random_bool(0.5) {
            wa
          } else {
            wb
          }
        })
        .collect();

      if let Some(child) = Allocation::normalized(&genes) {
        return child;
      }
    }
  }
}
