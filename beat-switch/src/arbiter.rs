// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Output arbitration between ingress ports.
//!
//! Each egress port owns one policy implementing [`Arbitrate`]. Once per tick
//! the switch passes it the set of ingress ports that are ready to send to
//! that egress port and the policy grants at most one of them.

use std::fmt;
use std::rc::Rc;

use beat_engine::sim_error;
use beat_engine::types::SimError;
use beat_track::entity::Entity;
use beat_track::trace;
use serde::{Deserialize, Serialize};

pub trait Arbitrate {
    /// Pick one of the inputs for which `ready` is true.
    fn arbitrate(&mut self, entity: &Rc<Entity>, ready: &[bool]) -> Option<usize>;
}

/// Strict round robin.
///
/// The scan starts one past the last granted input. Inputs that are not ready
/// are skipped without using up a turn, so with K inputs ready every one of
/// them is granted within K grants.
pub struct RoundRobin {
    candidate: usize,
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self { candidate: 0 }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Arbitrate for RoundRobin {
    fn arbitrate(&mut self, entity: &Rc<Entity>, ready: &[bool]) -> Option<usize> {
        let num_inputs = ready.len();
        for i in 0..num_inputs {
            let index = (i + self.candidate) % num_inputs;
            if ready[index] {
                trace!(entity ; "rr: grant {} (from {})", index, self.candidate);
                self.candidate = (index + 1) % num_inputs;
                return Some(index);
            }
        }
        None
    }
}

/// Round robin where input `i` may take up to `weights[i]` grants in a row
/// before passing its turn on.
///
/// The policy is work conserving: if only inputs that have used up their
/// weight are ready, the first of them in round-robin order is granted.
pub struct WeightedRoundRobin {
    candidate: usize,
    grants: Vec<usize>,
    weights: Vec<usize>,
}

impl WeightedRoundRobin {
    pub fn new(weights: Vec<usize>, num_inputs: usize) -> Result<Self, SimError> {
        if weights.len() != num_inputs {
            return sim_error!("The number of weights must be equal to the number of inputs");
        }
        if weights.contains(&0) {
            return sim_error!("Arbitration weights must be at least 1");
        }

        Ok(Self {
            candidate: 0,
            grants: vec![0; num_inputs],
            weights,
        })
    }

    fn state_str(&self, ready: &[bool]) -> String {
        let mut s = format!("{}: ", self.candidate);
        for (i, grant) in self.grants.iter().enumerate() {
            let req = if ready[i] { "r" } else { "-" };
            s.push_str(&format!("{}/{}/{}, ", req, grant, self.weights[i]));
        }
        s
    }
}

impl Arbitrate for WeightedRoundRobin {
    fn arbitrate(&mut self, entity: &Rc<Entity>, ready: &[bool]) -> Option<usize> {
        trace!(entity ; "wrr: arbitrate {}", self.state_str(ready));

        let num_inputs = ready.len();
        let mut selected = None;
        for i in 0..num_inputs {
            let index = (i + self.candidate) % num_inputs;
            if !ready[index] {
                continue;
            }
            if self.weights[index] > self.grants[index] {
                selected = Some(index);
                break;
            } else if selected.is_none() {
                selected = Some(index);
            }
        }

        let index = selected?;
        if self.grants[index] >= self.weights[index] {
            self.grants[index] = 0;
        }
        self.grants[index] += 1;
        if self.grants[index] >= self.weights[index] {
            self.candidate = (index + 1) % num_inputs;
        } else {
            self.candidate = index;
        }
        Some(index)
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ArbiterKind {
    /// Strict round robin
    #[default]
    RoundRobin,

    /// Round robin using per-port weights
    WeightedRoundRobin,
}

impl fmt::Display for ArbiterKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Build one arbitration policy for an egress port.
pub fn build_arbiter(
    kind: ArbiterKind,
    weights: &[usize],
) -> Result<Box<dyn Arbitrate>, SimError> {
    Ok(match kind {
        ArbiterKind::RoundRobin => Box::new(RoundRobin::new()),
        ArbiterKind::WeightedRoundRobin => {
            Box::new(WeightedRoundRobin::new(weights.to_vec(), weights.len())?)
        }
    })
}

#[cfg(test)]
mod tests {
    use beat_track::entity::toplevel;
    use beat_track::tracker::dev_null_tracker;

    use super::*;

    fn grants(policy: &mut dyn Arbitrate, ready: &[bool], n: usize) -> Vec<usize> {
        let top = toplevel(&dev_null_tracker(), "top");
        (0..n).filter_map(|_| policy.arbitrate(&top, ready)).collect()
    }

    #[test]
    fn round_robin_rotates() {
        let mut rr = RoundRobin::new();
        assert_eq!(
            grants(&mut rr, &[true, true, true, true], 8),
            vec![0, 1, 2, 3, 0, 1, 2, 3]
        );
    }

    #[test]
    fn round_robin_skips_idle_inputs() {
        let mut rr = RoundRobin::new();
        assert_eq!(grants(&mut rr, &[false, true, false, true], 4), vec![1, 3, 1, 3]);
        assert_eq!(grants(&mut rr, &[false; 4], 2), Vec::<usize>::new());
        // After granting 3 the scan continues from 0
        assert_eq!(grants(&mut rr, &[true, true, false, false], 1), vec![0]);
    }

    #[test]
    fn weighted() {
        let mut wrr = WeightedRoundRobin::new(vec![2, 1, 1], 3).unwrap();
        assert_eq!(
            grants(&mut wrr, &[true, true, true], 8),
            vec![0, 0, 1, 2, 0, 0, 1, 2]
        );
        // Work conserving when only one input is ready
        assert_eq!(grants(&mut wrr, &[false, true, false], 3), vec![1, 1, 1]);
    }

    #[test]
    fn weighted_config_errors() {
        assert!(WeightedRoundRobin::new(vec![1, 1], 3).is_err());
        assert!(WeightedRoundRobin::new(vec![1, 0, 1], 3).is_err());
        assert!(build_arbiter(ArbiterKind::WeightedRoundRobin, &[1, 2]).is_ok());
    }
}
