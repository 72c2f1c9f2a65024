//! Physical machine energy models.

use dyn_clone::{clone_trait_object, DynClone};
use erased_serde::serialize_trait_object;
use serde::Serialize;

/// Raw coefficients of the power-law family `P(u) = c0 + c1*u + c2*u^r`.
///
/// A constant model reports `c1 = c2 = 0` and `r = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EnergyModelCoefficients {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    pub r: f64,
}

/// An energy model maps the utilization level `u` in `[0, 1]` of a resource to the instantaneous power
/// consumed by the machine owning it.
///
/// Besides the evaluator, the model exposes its raw coefficients and derivative so that the placement
/// problem can be built on top of it.
pub trait EnergyModel: DynClone + erased_serde::Serialize {
    fn consumed_energy(&self, utilization: f64) -> f64;

    /// Derivative of [`consumed_energy`](EnergyModel::consumed_energy) at `utilization`.
    fn marginal_energy(&self, utilization: f64) -> f64;

    fn coefficients(&self) -> EnergyModelCoefficients;
}

clone_trait_object!(EnergyModel);
serialize_trait_object!(EnergyModel);

#[derive(Clone, Serialize)]
pub struct ConstantEnergyModel {
    c0: f64,
}

impl ConstantEnergyModel {
    pub fn new(c0: f64) -> Self {
        Self { c0 }
    }
}

impl EnergyModel for ConstantEnergyModel {
    fn consumed_energy(&self, _utilization: f64) -> f64 {
        self.c0
    }

    fn marginal_energy(&self, _utilization: f64) -> f64 {
        0.0
    }

    fn coefficients(&self) -> EnergyModelCoefficients {
        EnergyModelCoefficients { c0: self.c0, c1: 0.0, c2: 0.0, r: 1.0 }
    }
}

/// Fan et al. (2007) style model: `P(u) = c0 + c1*u + c2*u^r`.
#[derive(Clone, Serialize)]
pub struct Fan2007EnergyModel {
    c0: f64,
    c1: f64,
    c2: f64,
    r: f64,
}

impl Fan2007EnergyModel {
    pub fn new(c0: f64, c1: f64, c2: f64, r: f64) -> Self {
        assert!(r > 0.0, "Fan2007 exponent must be positive");
        Self { c0, c1, c2, r }
    }
}

impl EnergyModel for Fan2007EnergyModel {
    fn consumed_energy(&self, utilization: f64) -> f64 {
        self.c0 + self.c1 * utilization + self.c2 * utilization.powf(self.r)
    }

    fn marginal_energy(&self, utilization: f64) -> f64 {
        if utilization <= 0.0 {
            return if self.r > 1.0 {
                self.c1
            } else if self.r == 1.0 {
                self.c1 + self.c2
            } else {
                f64::INFINITY
            };
        }
        self.c1 + self.c2 * self.r * utilization.powf(self.r - 1.0)
    }

    fn coefficients(&self) -> EnergyModelCoefficients {
        EnergyModelCoefficients { c0: self.c0, c1: self.c1, c2: self.c2, r: self.r }
    }
}
