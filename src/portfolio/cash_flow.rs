//! # Required Return from Cash Flows
//!
//! $$
//! \operatorname{NPV}(g) = F + \sum_{k=1}^{m} c_k\,g^{-k} = 0
//! $$
//!
//! Growth factor `g = 1 + irr` at which the invested funds exactly cover a
//! schedule of yearly withdrawals (negative) and deposits (positive).

use roots::SimpleConvergency;
use roots::find_root_brent;

const GRID_LOW: f64 = 1e-2;
const GRID_HIGH: f64 = 1e2;
const GRID_POINTS: usize = 400;

fn npv(funds_available: f64, flows: &[f64], growth: f64) -> f64 {
  flows
    .iter()
    .enumerate()
    .fold(funds_available, |acc, (k, &c)| acc + c / growth.powi(k as i32 + 1))
}

/// Growth factor `1 + irr` for `[funds_available, flows...]`, or `None` if
/// the net present value never changes sign.
///
/// When several roots exist the one closest to `1` is returned.
pub fn required_return_from_cash_flows(flows: &[f64], funds_available: f64) -> Option<f64> {
  if !funds_available.is_finite() || flows.iter().any(|c| !c.is_finite()) {
    return None;
  }

  let f = |g: f64| npv(funds_available, flows, g);
  let step = (GRID_HIGH / GRID_LOW).ln() / GRID_POINTS as f64;
  let grid: Vec<f64> = (0..=GRID_POINTS)
    .map(|i| GRID_LOW * (step * i as f64).exp())
    .collect();

  let mut roots = Vec::new();
  for w in grid.windows(2) {
    let (a, b) = (w[0], w[1]);
    let (fa, fb) = (f(a), f(b));
    if fa == 0.0 {
      roots.push(a);
      continue;
    }
    if fa.signum() == fb.signum() {
      continue;
    }
    let mut convergency = SimpleConvergency {
      eps: 1e-12,
      max_iter: 100,
    };
    if let Ok(root) = find_root_brent(a, b, f, &mut convergency) {
      roots.push(root);
    }
  }

  roots
    .into_iter()
    .min_by(|a, b| (a - 1.0).abs().total_cmp(&(b - 1.0).abs()))
}
