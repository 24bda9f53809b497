//! The version transition: apply a delta under clamp and reset rules.
//!
//! Each component is computed as `current + delta`, then:
//!
//! 1. a negative result is clamped to zero (if clamping is allowed), else
//! 2. a positive result is reset to zero when a higher component was
//!    incremented (if precedence reset is allowed).
//!
//! Clamping is checked first, so a component that would go negative is
//! reported as clamped even when it is also due for a reset. Reset flags come
//! only from directives, never from other components' results.

use serde::Serialize;
use tracing::{debug, instrument};

use super::delta::{ResetPolicy, VersionDelta};
use super::{Component, SemanticVersion};

/// Safety switches for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionConfig {
    /// Clamp negative components to zero.
    pub allow_negative_clamp: bool,
    /// Zero lower components when a higher one is incremented.
    pub allow_reset_by_precedence: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            allow_negative_clamp: true,
            allow_reset_by_precedence: true,
        }
    }
}

/// Why a component was adjusted after applying its delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentReason {
    /// The component would have gone below zero.
    NegativeClamp,
    /// A higher-precedence component was incremented.
    PrecedenceReset,
}

impl std::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeClamp => write!(f, "negative clamp"),
            Self::PrecedenceReset => write!(f, "precedence reset"),
        }
    }
}

/// A record of one automatic adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustmentNote {
    /// The adjusted component.
    pub component: Component,
    /// Value after applying the delta, before adjustment.
    pub old_value: i64,
    /// Value after adjustment (always zero).
    pub new_value: i64,
    /// Which rule fired.
    pub reason: AdjustmentReason,
}

impl std::fmt::Display for AdjustmentNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} → {} ({})",
            self.component, self.old_value, self.new_value, self.reason
        )
    }
}

/// Result of [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The new version. Pre-release and build metadata are copied through.
    pub version: SemanticVersion,
    /// Adjustments applied, in major, minor, patch order.
    pub notes: Vec<AdjustmentNote>,
}

/// Compute the next version. Never fails.
#[instrument(level = "debug", skip_all, fields(?delta, ?policy, ?config))]
pub fn transition(
    current: &SemanticVersion,
    delta: &VersionDelta,
    policy: &ResetPolicy,
    config: &TransitionConfig,
) -> Transition {
    let mut version = current.clone();
    let mut notes = Vec::new();

    for component in Component::ALL {
        let candidate = current.get(component).saturating_add(delta.get(component));

        let reason = if candidate < 0 && config.allow_negative_clamp {
            Some(AdjustmentReason::NegativeClamp)
        } else if policy.is_due(component) && candidate > 0 && config.allow_reset_by_precedence {
            Some(AdjustmentReason::PrecedenceReset)
        } else {
            None
        };

        let value = match reason {
            Some(reason) => {
                notes.push(AdjustmentNote {
                    component,
                    old_value: candidate,
                    new_value: 0,
                    reason,
                });
                0
            }
            None => candidate,
        };

        version.set(component, value);
    }

    debug!(from = %current, to = %version, adjustments = notes.len(), "computed transition");
    Transition { version, notes }
}
