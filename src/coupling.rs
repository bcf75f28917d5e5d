//! Mechanically coupled axis mapping.
//!
//! The wrist gearbox drives two joints through a differential: the two
//! physical motor channels carry the sum and difference of the two logical
//! joint angles. The transform is the linear map `[[1, 1], [1, -1]]` on the
//! coupled pair and identity everywhere else; its inverse is
//! `0.5 * [[1, 1], [1, -1]]`.

use crate::JointVector;
use crate::config::CouplingConfig;

#[derive(Debug, Clone, Copy)]
pub struct AxisCoupling {
    enabled: bool,
    pair: (usize, usize),
}

impl AxisCoupling {
    pub fn new(config: &CouplingConfig) -> Self {
        Self {
            enabled: config.enabled,
            pair: (config.pair[0], config.pair[1]),
        }
    }

    /// Identity mapping: every logical axis is its own motor channel.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            pair: (4, 5),
        }
    }

    /// Map logical joint angles to physical motor angles.
    pub fn to_physical(&self, logical: &JointVector) -> JointVector {
        let mut physical = *logical;
        if self.enabled {
            let (i, j) = self.pair;
            physical[i] = logical[i] + logical[j];
            physical[j] = logical[i] - logical[j];
        }
        physical
    }

    /// Map physical motor angles back to logical joint angles.
    pub fn to_logical(&self, physical: &JointVector) -> JointVector {
        let mut logical = *physical;
        if self.enabled {
            let (i, j) = self.pair;
            logical[i] = 0.5 * (physical[i] + physical[j]);
            logical[j] = 0.5 * (physical[i] - physical[j]);
        }
        logical
    }
}
