use rand::Rng;

/// A single roll of a die with `sides` faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub sides: u64,
    pub result: u64,
}

impl DiceRoll {
    /// `None` when `sides` is not positive.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, sides: i64) -> Option<Self> {
        let sides = u64::try_from(sides).ok().filter(|&s| s > 0)?;
        Some(Self {
            sides,
            result: rng.gen_range(1..=sides),
        })
    }

    pub fn describe(&self, who: &str) -> String {
        format!("{} rolled: **{}** on a d{}", who, self.result, self.sides)
    }
}

/// Resources recovered during a jungle rest: one or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JungleRest {
    pub restored: u8,
}

impl JungleRest {
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            restored: rng.gen_range(1..=2),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} hit die, long rest resource or spell slot restored",
            self.restored
        )
    }

    pub fn footer(&self) -> String {
        format!("Jungle rest rolled {}!", self.restored)
    }
}
