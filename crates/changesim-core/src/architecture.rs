//! Synthetic software architecture and its coupling metrics.
//!
//! An architecture is a square matrix of dependency strengths between
//! modules: entry `(i, j)` in `[0, 1]` is how strongly module `i` depends on
//! module `j`, the diagonal is always zero. Per-module coupling weight follows
//! Martin's instability metric scaled by the weight of incoming dependencies:
//!
//! ```text
//! weight(m) = Ce / (Ce + Ca) * sum(column m)
//! ```
//!
//! The matrix is an owned value. Structural edits consume it and hand back
//! the edited matrix, so there is only ever one current version of the
//! architecture in flight.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Fill-stride factor range used by [`ArchitectureMatrix::generate`].
const GENERATE_STRIDE_FACTOR: (f64, f64) = (0.0, 0.3);
/// Fill-stride factor range for the row/column of a newly added module.
const ADD_STRIDE_FACTOR: (f64, f64) = (0.1, 1.0);

// ---------------------------------------------------------------------------
// Change types
// ---------------------------------------------------------------------------

/// Kind of edit a change makes to the architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Delete a module and every dependency touching it.
    Remove,
    /// Modify a module's internals; the dependency graph is unchanged.
    Change,
    /// Introduce a new module with fresh dependencies.
    Add,
}

impl ChangeType {
    pub const ALL: [ChangeType; 3] = [Self::Remove, Self::Change, Self::Add];

    /// Numeric type code (1-based) used by the effort model.
    pub fn code(self) -> u32 {
        match self {
            Self::Remove => 1,
            Self::Change => 2,
            Self::Add => 3,
        }
    }

    /// Pick a change type uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Change => write!(f, "change"),
            Self::Add => write!(f, "add"),
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// Weighted module-dependency matrix, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchitectureMatrix {
    modules: usize,
    weights: Vec<f64>,
}

impl ArchitectureMatrix {
    /// An architecture with no modules.
    pub fn empty() -> Self {
        Self::zeros(0)
    }

    /// `n` modules without any dependencies.
    pub fn zeros(n: usize) -> Self {
        Self {
            modules: n,
            weights: vec![0.0; n * n],
        }
    }

    /// Build from explicit rows. Rows must form a square matrix with a zero
    /// diagonal and every weight in `[0, 1]`.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut weights = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(SimError::MalformedMatrix(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            for (j, w) in row.into_iter().enumerate() {
                if !(0.0..=1.0).contains(&w) {
                    return Err(SimError::MalformedMatrix(format!(
                        "weight ({i}, {j}) = {w} is outside [0, 1]"
                    )));
                }
                if i == j && w != 0.0 {
                    return Err(SimError::MalformedMatrix(format!(
                        "module {i} depends on itself"
                    )));
                }
                weights.push(w);
            }
        }
        Ok(Self { modules: n, weights })
    }

    /// Generate a random architecture with `module_count` modules.
    ///
    /// A fill stride `s = floor(n * U[0, 0.3))` is drawn once; scanning the
    /// off-diagonal cells row by row, every `(s + 1)`-th cell receives a
    /// weight in `[0.01, 1.0]`.
    pub fn generate<R: Rng + ?Sized>(module_count: usize, rng: &mut R) -> Result<Self> {
        if module_count == 0 {
            return Err(SimError::invalid("module count must be positive"));
        }
        let n = module_count;
        let mut fill = StrideFill::draw(n, GENERATE_STRIDE_FACTOR, rng);
        let mut matrix = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                if i != j && fill.hit() {
                    matrix.weights[i * n + j] = sample_weight(rng);
                }
            }
        }
        debug!(
            "generated architecture: {n} modules, stride {}, {} dependencies",
            fill.stride,
            matrix.dependency_count()
        );
        Ok(matrix)
    }

    pub fn module_count(&self) -> usize {
        self.modules
    }

    pub fn is_empty(&self) -> bool {
        self.modules == 0
    }

    /// Dependency strength from module `from` to module `to`.
    pub fn weight(&self, from: usize, to: usize) -> f64 {
        self.weights[from * self.modules + to]
    }

    /// Iterate over rows (outgoing dependencies per module).
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, an empty matrix simply has no rows
        self.weights.chunks_exact(self.modules.max(1))
    }

    /// Number of non-zero dependencies in the whole matrix.
    pub fn dependency_count(&self) -> usize {
        self.weights.iter().filter(|&&w| w != 0.0).count()
    }

    /// Efferent coupling (Ce): modules this one depends on.
    pub fn efferent_count(&self, module: usize) -> usize {
        (0..self.modules)
            .filter(|&j| j != module && self.weight(module, j) != 0.0)
            .count()
    }

    /// Afferent coupling (Ca): modules depending on this one.
    pub fn afferent_count(&self, module: usize) -> usize {
        (0..self.modules)
            .filter(|&i| i != module && self.weight(i, module) != 0.0)
            .count()
    }

    /// Sum of incoming dependency weights.
    pub fn afferent_weight(&self, module: usize) -> f64 {
        (0..self.modules).map(|i| self.weight(i, module)).sum()
    }

    /// Instability: Ce / (Ce + Ca), 0 for an isolated module.
    pub fn instability(&self, module: usize) -> f64 {
        let ce = self.efferent_count(module);
        let ca = self.afferent_count(module);
        if ce + ca == 0 {
            0.0
        } else {
            ce as f64 / (ce + ca) as f64
        }
    }

    /// Coupling weight of a single module, always computed from the current matrix.
    pub fn coupling_weight(&self, module: usize) -> f64 {
        self.instability(module) * self.afferent_weight(module)
    }

    /// Coupling weight of every module.
    pub fn coupling_weights(&self) -> Vec<f64> {
        (0..self.modules).map(|m| self.coupling_weight(m)).collect()
    }

    /// Mean module coupling weight, rounded to three decimals.
    pub fn coupling_degree(&self) -> f64 {
        if self.modules == 0 {
            return 0.0;
        }
        let total: f64 = self.coupling_weights().iter().sum();
        round_to(total / self.modules as f64, 3)
    }

    /// Apply a structural edit, returning the affected module's coupling
    /// contribution together with the edited architecture.
    ///
    /// - `Remove`: weight is taken *before* the module is excised.
    /// - `Change`: weight of a random module; the matrix is untouched.
    /// - `Add`: weight of the new module *after* insertion.
    ///
    /// `Remove` and `Change` on an empty architecture are no-ops with a zero
    /// contribution.
    pub fn apply_change<R: Rng + ?Sized>(mut self, change_type: ChangeType, rng: &mut R) -> (f64, Self) {
        match change_type {
            ChangeType::Remove | ChangeType::Change if self.is_empty() => {
                debug!("{change_type} requested on an empty architecture, no-op");
                (0.0, self)
            }
            ChangeType::Remove => {
                let module = rng.random_range(0..self.modules);
                let contribution = self.coupling_weight(module);
                self.remove_module(module);
                (contribution, self)
            }
            ChangeType::Change => {
                let module = rng.random_range(0..self.modules);
                (self.coupling_weight(module), self)
            }
            ChangeType::Add => {
                let module = self.add_module(rng);
                (self.coupling_weight(module), self)
            }
        }
    }

    fn remove_module(&mut self, module: usize) {
        let n = self.modules;
        let mut weights = Vec::with_capacity((n - 1) * (n - 1));
        for i in (0..n).filter(|&i| i != module) {
            for j in (0..n).filter(|&j| j != module) {
                weights.push(self.weight(i, j));
            }
        }
        self.modules = n - 1;
        self.weights = weights;
    }

    /// Append a module and return its index.
    fn add_module<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let old = self.modules;
        let n = old + 1;
        let mut fill = StrideFill::draw(old, ADD_STRIDE_FACTOR, rng);

        let mut weights = vec![0.0; n * n];
        for i in 0..old {
            weights[i * n..i * n + old].copy_from_slice(&self.weights[i * old..(i + 1) * old]);
        }
        // new row first, then the new column of the existing rows
        for j in 0..n {
            if fill.hit() {
                weights[old * n + j] = sample_weight(rng);
            }
        }
        for i in 0..old {
            if fill.hit() {
                weights[i * n + old] = sample_weight(rng);
            }
        }
        weights[old * n + old] = 0.0;

        self.modules = n;
        self.weights = weights;
        old
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Every `(stride + 1)`-th scanned cell is filled.
struct StrideFill {
    stride: usize,
    counter: usize,
}

impl StrideFill {
    fn draw<R: Rng + ?Sized>(modules: usize, factor: (f64, f64), rng: &mut R) -> Self {
        let stride = (modules as f64 * rng.random_range(factor.0..factor.1)).floor() as usize;
        Self { stride, counter: 0 }
    }

    fn hit(&mut self) -> bool {
        if self.counter == self.stride {
            self.counter = 0;
            true
        } else {
            self.counter += 1;
            false
        }
    }
}

fn sample_weight<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    round_to(rng.random_range(0.01..=1.0), 2)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
