//! Control topology: runtime single-loop / double-loop selection.
//!
//! The topology is chosen once from configuration and dispatched with a
//! single branch per tick. Single loop drives the actuator straight from
//! the position error; double loop nests an outer position loop producing
//! a spring torque reference around an inner torque-tracking loop.

use sea_common::config::{ConfigError, OutputLimits, TopologyConfig};

use super::biquad::FilterCascade;

/// Spring torque pair computed by a double-loop tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringTorque {
    /// Torque reference from the outer loop [N·m], post-clamp.
    pub reference: f64,
    /// Estimated actual spring torque [N·m].
    pub actual: f64,
}

/// Result of one topology step.
#[derive(Debug, Clone, Copy)]
pub struct TickCommand {
    /// Actuator command [V], clamped to the actuator range.
    pub volts: f64,
    /// Torque pair, present for double-loop topologies only.
    pub spring: Option<SpringTorque>,
}

/// The controller realization for one session.
#[derive(Debug, Clone)]
pub enum ControlTopology {
    /// Position error → controller cascade → actuator volts.
    SingleLoop {
        /// Position controller.
        controller: FilterCascade,
    },
    /// Position error → outer cascade → torque reference; torque error →
    /// inner cascade → actuator volts.
    DoubleLoop {
        /// Outer (position) controller.
        outer: FilterCascade,
        /// Inner (torque) controller.
        inner: FilterCascade,
    },
}

impl ControlTopology {
    /// Build the runtime topology from its configuration.
    pub fn from_config(config: &TopologyConfig) -> Result<Self, ConfigError> {
        match config {
            TopologyConfig::SingleLoop { controller } => Ok(Self::SingleLoop {
                controller: FilterCascade::from_config(controller)?,
            }),
            TopologyConfig::DoubleLoop { outer, inner } => Ok(Self::DoubleLoop {
                outer: FilterCascade::from_config(outer)?,
                inner: FilterCascade::from_config(inner)?,
            }),
        }
    }

    /// Whether this is the nested position/torque topology.
    #[inline]
    pub const fn is_double_loop(&self) -> bool {
        matches!(self, Self::DoubleLoop { .. })
    }

    /// Zero all cascade history, preserving coefficients.
    pub fn reset(&mut self) {
        match self {
            Self::SingleLoop { controller } => controller.reset(),
            Self::DoubleLoop { outer, inner } => {
                outer.reset();
                inner.reset();
            }
        }
    }

    /// Run one control step.
    ///
    /// `position_error_rad` is the reference-minus-actual position error
    /// in radians; `spring_torque_nm` is the estimated actual spring
    /// torque (ignored by the single loop). The returned voltage is
    /// already clamped to the actuator range.
    #[inline]
    pub fn step(
        &mut self,
        position_error_rad: f64,
        spring_torque_nm: f64,
        limits: &OutputLimits,
    ) -> TickCommand {
        match self {
            Self::SingleLoop { controller } => TickCommand {
                volts: controller.process(
                    position_error_rad,
                    limits.actuator_min_v,
                    limits.actuator_max_v,
                ),
                spring: None,
            },
            Self::DoubleLoop { outer, inner } => {
                let reference = outer.process(
                    position_error_rad,
                    limits.torque_min_nm,
                    limits.torque_max_nm,
                );
                let torque_error = reference - spring_torque_nm;
                let volts =
                    inner.process(torque_error, limits.actuator_min_v, limits.actuator_max_v);
                TickCommand {
                    volts,
                    spring: Some(SpringTorque {
                        reference,
                        actual: spring_torque_nm,
                    }),
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sea_common::config::BiquadConfig;

    fn unity_config() -> Vec<BiquadConfig> {
        vec![BiquadConfig {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
        }]
    }

    fn limits() -> OutputLimits {
        OutputLimits {
            actuator_min_v: -7.5,
            actuator_max_v: 7.5,
            torque_min_nm: -0.5,
            torque_max_nm: 0.5,
        }
    }

    #[test]
    fn single_loop_passes_error_to_actuator() {
        let mut topo = ControlTopology::from_config(&TopologyConfig::SingleLoop {
            controller: unity_config(),
        })
        .unwrap();
        let cmd = topo.step(2.0, 0.0, &limits());
        assert_eq!(cmd.volts, 2.0);
        assert!(cmd.spring.is_none());
    }

    #[test]
    fn single_loop_clamps_to_actuator_range() {
        let mut topo = ControlTopology::from_config(&TopologyConfig::SingleLoop {
            controller: unity_config(),
        })
        .unwrap();
        assert_eq!(topo.step(100.0, 0.0, &limits()).volts, 7.5);
        assert_eq!(topo.step(-100.0, 0.0, &limits()).volts, -7.5);
    }

    #[test]
    fn double_loop_torque_reference_is_clamped_to_torque_range() {
        let mut topo = ControlTopology::from_config(&TopologyConfig::DoubleLoop {
            outer: unity_config(),
            inner: unity_config(),
        })
        .unwrap();
        // Large position error: outer output saturates at 0.5 N·m, and the
        // inner loop sees reference − actual.
        let cmd = topo.step(100.0, 0.1, &limits());
        let spring = cmd.spring.unwrap();
        assert_eq!(spring.reference, 0.5);
        assert_eq!(spring.actual, 0.1);
        assert!((cmd.volts - 0.4).abs() < 1e-12);
    }

    #[test]
    fn double_loop_torque_error_sign() {
        // Actual torque above the reference must push the command negative.
        let mut topo = ControlTopology::from_config(&TopologyConfig::DoubleLoop {
            outer: unity_config(),
            inner: unity_config(),
        })
        .unwrap();
        let cmd = topo.step(0.0, 0.3, &limits());
        assert!((cmd.volts - (-0.3)).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_both_cascades() {
        let stateful = vec![BiquadConfig {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a0: 1.0,
            a1: -0.9,
            a2: 0.0,
        }];
        let mut topo = ControlTopology::from_config(&TopologyConfig::DoubleLoop {
            outer: stateful.clone(),
            inner: stateful,
        })
        .unwrap();
        for _ in 0..20 {
            topo.step(0.1, 0.0, &limits());
        }
        topo.reset();
        let cmd = topo.step(0.0, 0.0, &limits());
        assert_eq!(cmd.volts, 0.0, "reset topology must start from rest");
    }
}
