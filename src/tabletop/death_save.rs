use dashmap::DashMap;
use serenity::model::id::UserId;
use tracing::debug;

/// Running death-save tally for one character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathRollOutcome {
    /// Natural 1.
    TwoFailures { failures: u8 },
    Failure { failures: u8 },
    Success { successes: u8 },
    /// Natural 20.
    BackUp,
    Died,
    Stabilized,
}

impl DeathRollOutcome {
    pub fn describe(&self, mention: &str) -> String {
        match self {
            Self::TwoFailures { failures } => format!(
                "Two failed death saves! {}, you now have {} failure(s).",
                mention, failures
            ),
            Self::Failure { failures } => format!(
                "One failed death save! {}, you now have {} failure(s).",
                mention, failures
            ),
            Self::Success { successes } => format!(
                "One succeeded death save! {}, you now have {} success(es).",
                mention, successes
            ),
            Self::BackUp => format!("Regain one health, you're up! 🍀🍀🍀 {}.", mention),
            Self::Died => format!("{} has died! 💀 You failed 3 death saves.", mention),
            Self::Stabilized => {
                format!("{} is stabilized! 😴 You succeeded 3 death saves.", mention)
            }
        }
    }
}

/// Applies one d20 result to a tally.
pub fn apply_roll(saves: &mut DeathSaves, roll: u8) -> DeathRollOutcome {
    let outcome = match roll {
        20 => {
            *saves = DeathSaves::default();
            return DeathRollOutcome::BackUp;
        }
        1 => {
            saves.failures += 2;
            DeathRollOutcome::TwoFailures {
                failures: saves.failures,
            }
        }
        2..=9 => {
            saves.failures += 1;
            DeathRollOutcome::Failure {
                failures: saves.failures,
            }
        }
        _ => {
            saves.successes += 1;
            DeathRollOutcome::Success {
                successes: saves.successes,
            }
        }
    };

    if saves.failures >= 3 {
        *saves = DeathSaves::default();
        DeathRollOutcome::Died
    } else if saves.successes >= 3 {
        *saves = DeathSaves::default();
        DeathRollOutcome::Stabilized
    } else {
        outcome
    }
}

/// Death saves per user, in memory only.
#[derive(Debug, Default)]
pub struct DeathSaveTracker {
    saves: DashMap<UserId, DeathSaves>,
}

impl DeathSaveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roll(&self, user: UserId, roll: u8) -> DeathRollOutcome {
        let mut saves = self.saves.entry(user).or_default();
        let outcome = apply_roll(&mut saves, roll);
        debug!("☠️ Death roll {} for {}: {:?} -> {:?}", roll, user, outcome, *saves);
        outcome
    }

    pub fn reset(&self, user: UserId) {
        self.saves.insert(user, DeathSaves::default());
    }

    pub fn get(&self, user: UserId) -> DeathSaves {
        self.saves.get(&user).map(|s| *s).unwrap_or_default()
    }
}
