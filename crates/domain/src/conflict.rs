//! Arbitration between protection, schedule and operator commands.

use crate::power::CommandOrigin;

/// Outcome of arbitrating a command against the protection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Send the command. When `reset_protection` is set, the per-device
    /// automation state is cleared before sending.
    Issue { reset_protection: bool },
    /// Drop the command; a maintenance alert records the skipped action.
    Suppress,
}

impl Resolution {
    #[must_use]
    pub fn is_issued(self) -> bool {
        matches!(self, Self::Issue { .. })
    }
}

/// Decide whether a command may go out.
///
/// `protection_holding` is true while any metric of the device is in
/// cooldown or has exhausted its retries.
///
/// - operator commands always go out and reset the device state;
/// - protection commands always go out;
/// - schedule commands go out unless protection holds the device, in which
///   case `override_protection` decides between an implicit reset and
///   suppression.
#[must_use]
pub fn resolve(
    origin: CommandOrigin,
    protection_holding: bool,
    override_protection: bool,
) -> Resolution {
    match origin {
        CommandOrigin::Manual => Resolution::Issue {
            reset_protection: true,
        },
        CommandOrigin::Protection { .. } => Resolution::Issue {
            reset_protection: false,
        },
        CommandOrigin::Schedule if !protection_holding => Resolution::Issue {
            reset_protection: false,
        },
        CommandOrigin::Schedule if override_protection => Resolution::Issue {
            reset_protection: true,
        },
        CommandOrigin::Schedule => Resolution::Suppress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection::Metric;

    #[test]
    fn should_always_issue_manual_command_with_reset() {
        for holding in [false, true] {
            for override_protection in [false, true] {
                assert_eq!(
                    resolve(CommandOrigin::Manual, holding, override_protection),
                    Resolution::Issue {
                        reset_protection: true
                    }
                );
            }
        }
    }

    #[test]
    fn should_issue_protection_command_without_reset() {
        let origin = CommandOrigin::Protection {
            metric: Metric::Current,
        };
        assert_eq!(
            resolve(origin, true, false),
            Resolution::Issue {
                reset_protection: false
            }
        );
    }

    #[test]
    fn should_issue_schedule_command_when_protection_idle() {
        assert_eq!(
            resolve(CommandOrigin::Schedule, false, false),
            Resolution::Issue {
                reset_protection: false
            }
        );
    }

    #[test]
    fn should_suppress_schedule_command_when_protection_holds_without_override() {
        assert_eq!(
            resolve(CommandOrigin::Schedule, true, false),
            Resolution::Suppress
        );
    }

    #[test]
    fn should_issue_and_reset_when_schedule_overrides_protection() {
        let resolution = resolve(CommandOrigin::Schedule, true, true);
        assert!(resolution.is_issued());
        assert_eq!(
            resolution,
            Resolution::Issue {
                reset_protection: true
            }
        );
    }
}
