//! Kriging weight solver
//!
//! Residuals are interpolated with ordinary kriging under a linear
//! semivariogram γ(h) = h, so the system for n active stations is
//!
//! ```text
//! [d(x₁,x₁) ... d(x₁,xₙ) 1] [w₁]   [d(x₁,x₀)]
//! [   ...     ...    ...  .] [. ] = [   ...   ]
//! [d(xₙ,x₁) ... d(xₙ,xₙ) 1] [wₙ]   [d(xₙ,x₀)]
//! [  1       ...    1     0] [μ ]   [    1    ]
//! ```
//!
//! where d is the distance in km and μ the Lagrange multiplier enforcing
//! Σwᵢ = 1. Negative weights are removed iteratively: among the active
//! stations with a negative weight, the one with the greatest elevation
//! (the first one on ties) is dropped and the system is solved again,
//! until every weight is non-negative or a single station remains with
//! weight 1. Dropped stations get weight 0.
//!
//! Reference:
//! Garen, D.C. & Marks, D. (2005). Spatially distributed energy balance
//! snowmelt modelling in a mountainous river basin. Journal of Hydrology
//! 315, 126–153 (detrended kriging, appendix).

mod lu;
mod weights;

pub use lu::LuDecomposition;
pub use weights::WeightTable;

use crate::geometry::{distance_matrix, distances_to};
use dkrige_core::{CoordinateSystem, Error, Location, Result, Station};
use ndarray::Array2;

/// Station positions and elevations prepared for repeated weight solves
#[derive(Debug, Clone)]
pub struct StationGeometry {
    system: CoordinateSystem,
    locations: Vec<Location>,
    elevations: Vec<f64>,
    distances: Array2<f64>,
}

impl StationGeometry {
    /// Precompute the station-to-station distance matrix
    pub fn new(system: CoordinateSystem, locations: Vec<Location>, elevations: Vec<f64>) -> Result<Self> {
        if locations.len() != elevations.len() {
            return Err(Error::SizeMismatch {
                er: locations.len(),
                ec: 1,
                ar: elevations.len(),
                ac: 1,
            });
        }
        let distances = distance_matrix(system, &locations);
        Ok(Self {
            system,
            locations,
            elevations,
            distances,
        })
    }

    /// Precompute distances and elevations from station records
    pub fn from_stations(system: CoordinateSystem, stations: &[Station]) -> Self {
        let distances = distance_matrix(
            system,
            &stations.iter().map(|s| s.location).collect::<Vec<_>>(),
        );
        Self {
            system,
            locations: stations.iter().map(|s| s.location).collect(),
            elevations: stations.iter().map(|s| s.elevation).collect(),
            distances,
        }
    }

    /// Number of stations
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn distances(&self) -> &Array2<f64> {
        &self.distances
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    /// Distance from `target` to every station
    pub fn target_distances(&self, target: Location) -> Vec<f64> {
        distances_to(self.system, target, &self.locations)
    }
}

/// Kriging weights for one target.
///
/// `active` lists the candidate stations (indices into `geometry`, in
/// ascending order) and `target` holds the distance from the target to
/// every station. The returned vector has one weight per station of
/// `geometry`; inactive and excluded stations get 0.
pub fn solve_weights(geometry: &StationGeometry, active: &[usize], target: &[f64]) -> Result<Vec<f64>> {
    solve_with_exclusions(geometry, active, target).map(|(weights, _)| weights)
}

/// [`solve_weights`], also returning the excluded stations in the order
/// they were dropped.
pub fn solve_with_exclusions(
    geometry: &StationGeometry,
    active: &[usize],
    target: &[f64],
) -> Result<(Vec<f64>, Vec<usize>)> {
    let total = geometry.len();
    if target.len() != total {
        return Err(Error::SizeMismatch {
            er: total,
            ec: 1,
            ar: target.len(),
            ac: 1,
        });
    }
    if active.is_empty() {
        return Err(Error::InsufficientStations { available: 0 });
    }

    let mut active = active.to_vec();
    let mut excluded = Vec::new();
    let mut weights = vec![0.0; total];

    loop {
        if active.len() == 1 {
            weights[active[0]] = 1.0;
            return Ok((weights, excluded));
        }

        let solution = solve_system(geometry, &active, target)?;

        let mut drop: Option<(usize, f64)> = None;
        for (pos, &station) in active.iter().enumerate() {
            if solution[pos] < 0.0 {
                let elevation = geometry.elevations[station];
                if drop.map_or(true, |(_, highest)| elevation > highest) {
                    drop = Some((pos, elevation));
                }
            }
        }

        match drop {
            Some((pos, _)) => {
                excluded.push(active.remove(pos));
            }
            None => {
                for (pos, &station) in active.iter().enumerate() {
                    weights[station] = solution[pos];
                }
                return Ok((weights, excluded));
            }
        }
    }
}

/// Assemble and solve the bordered system for the active stations.
/// Returns the n station weights followed by the Lagrange multiplier.
fn solve_system(geometry: &StationGeometry, active: &[usize], target: &[f64]) -> Result<Vec<f64>> {
    let k = active.len();
    let m = k + 1;
    let mut mat = vec![0.0_f64; m * m];
    let mut rhs = vec![0.0_f64; m];

    for (i, &si) in active.iter().enumerate() {
        for (j, &sj) in active.iter().enumerate() {
            mat[i * m + j] = geometry.distances[[si, sj]];
        }
        mat[i * m + k] = 1.0;
        mat[k * m + i] = 1.0;
        rhs[i] = target[si];
    }
    rhs[k] = 1.0;

    let lu = LuDecomposition::factor(m, mat)?;
    Ok(lu.solve(&rhs))
}

/// Weighted sum of station residuals
pub fn weighted_sum(weights: &[f64], residuals: &[f64]) -> f64 {
    weights
        .iter()
        .zip(residuals)
        .filter(|(w, _)| **w != 0.0)
        .map(|(w, r)| w * r)
        .sum()
}
