//! Increment/decrement directives and the delta they fold into.
//!
//! The CLI collects one [`Directive`] per flag occurrence. [`fold`] turns the
//! sequence into a [`VersionDelta`] and the [`ResetPolicy`] that goes with it
//! in a single pass.

use serde::Serialize;

use super::Component;

/// A single unit step requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Add one to the component.
    Increment(Component),
    /// Subtract one from the component.
    Decrement(Component),
}

/// Signed per-component deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VersionDelta {
    /// Change to the major component.
    pub major: i64,
    /// Change to the minor component.
    pub minor: i64,
    /// Change to the patch component.
    pub patch: i64,
}

impl VersionDelta {
    /// Read the delta for one component.
    pub const fn get(&self, component: Component) -> i64 {
        match component {
            Component::Major => self.major,
            Component::Minor => self.minor,
            Component::Patch => self.patch,
        }
    }

    /// True when every component delta is zero.
    pub const fn is_zero(&self) -> bool {
        self.major == 0 && self.minor == 0 && self.patch == 0
    }
}

/// Which lower components are due to reset because a higher one was incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetPolicy {
    /// Set by any major increment.
    pub minor_reset_due: bool,
    /// Set by any major or minor increment.
    pub patch_reset_due: bool,
}

impl ResetPolicy {
    /// Whether `component` is due for a precedence reset. Major never is.
    pub const fn is_due(&self, component: Component) -> bool {
        match component {
            Component::Major => false,
            Component::Minor => self.minor_reset_due,
            Component::Patch => self.patch_reset_due,
        }
    }
}

/// Fold directives into a delta and reset policy.
///
/// Increments and decrements are counted separately and only netted at the
/// end, so the result is the same for any ordering of the directives, even
/// when a component saturates. Only increments arm reset flags.
pub fn fold<I>(directives: I) -> (VersionDelta, ResetPolicy)
where
    I: IntoIterator<Item = Directive>,
{
    // [major, minor, patch] occurrence counts
    let mut up = [0u64; 3];
    let mut down = [0u64; 3];
    let mut policy = ResetPolicy::default();

    for directive in directives {
        match directive {
            Directive::Increment(component) => {
                let count = &mut up[index(component)];
                *count = count.saturating_add(1);
                match component {
                    Component::Major => {
                        policy.minor_reset_due = true;
                        policy.patch_reset_due = true;
                    }
                    Component::Minor => policy.patch_reset_due = true,
                    Component::Patch => {}
                }
            }
            Directive::Decrement(component) => {
                let count = &mut down[index(component)];
                *count = count.saturating_add(1);
            }
        }
    }

    let delta = VersionDelta {
        major: net(up[0], down[0]),
        minor: net(up[1], down[1]),
        patch: net(up[2], down[2]),
    };
    (delta, policy)
}

const fn index(component: Component) -> usize {
    match component {
        Component::Major => 0,
        Component::Minor => 1,
        Component::Patch => 2,
    }
}

/// `up - down`, saturated to the `i64` range.
fn net(up: u64, down: u64) -> i64 {
    let net = i128::from(up) - i128::from(down);
    i64::try_from(net).unwrap_or(if net < 0 { i64::MIN } else { i64::MAX })
}
