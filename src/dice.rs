//! `XdY` dice notation

use rand::Rng;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static DICE_NOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:([0-9]+)?\s*d)?\s*([0-9]+)").unwrap());

/// Upper bound on dice per roll, so the result fits in one Discord message.
const MAX_DICE: u32 = 100;

/// Well-formed notation asking for more dice than one message can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Can't roll {count} dice at once (at most {max})")]
pub struct TooManyDice {
    pub count: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
}

impl Default for DiceSpec {
    fn default() -> Self {
        Self { count: 1, sides: 6 }
    }
}

impl DiceSpec {
    /// Parse `[count]d<sides>`.  An empty string is a single six-sided die.  Anything unusable
    /// yields `None`; callers drop those silently.
    pub fn parse(notation: &str) -> Option<Self> {
        let notation = notation.trim();
        if notation.is_empty() {
            return Some(Self::default());
        }

        let caps = DICE_NOTATION.captures(notation)?;
        let count = match caps.get(1) {
            Some(count) => count.as_str().parse().ok()?,
            None => 1,
        };
        let sides = caps.get(2)?.as_str().parse().ok()?;

        if count == 0 || sides == 0 {
            return None;
        }
        Some(Self { count, sides })
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Roll, TooManyDice> {
        if self.count > MAX_DICE {
            return Err(TooManyDice {
                count: self.count,
                max: MAX_DICE,
            });
        }

        let rolls = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();
        Ok(Roll { rolls })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    rolls: Vec<u32>,
}

impl Roll {
    pub fn rolls(&self) -> &[u32] {
        &self.rolls
    }

    pub fn total(&self) -> u64 {
        self.rolls.iter().map(|&r| u64::from(r)).sum()
    }
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.rolls.as_slice() {
            [single] => write!(f, "\u{1F3B2} {}", single),
            rolls => {
                let rolls: Vec<String> = rolls.iter().map(u32::to_string).collect();
                write!(f, "\u{1F3B2} {} = {}", rolls.join(" + "), self.total())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn parses_notation() {
        assert_eq!(DiceSpec::parse("2d6"), Some(DiceSpec { count: 2, sides: 6 }));
        assert_eq!(DiceSpec::parse("d20"), Some(DiceSpec { count: 1, sides: 20 }));
        assert_eq!(DiceSpec::parse("3 D 8"), Some(DiceSpec { count: 3, sides: 8 }));
        assert_eq!(DiceSpec::parse("12"), Some(DiceSpec { count: 1, sides: 12 }));
        assert_eq!(DiceSpec::parse(""), Some(DiceSpec::default()));
    }

    #[test]
    fn malformed_notation_is_dropped() {
        assert_eq!(DiceSpec::parse("banana"), None);
        assert_eq!(DiceSpec::parse("d"), None);
        assert_eq!(DiceSpec::parse("2d0"), None);
        assert_eq!(DiceSpec::parse("0d6"), None);
        assert_eq!(DiceSpec::parse("99999999999999999999d6"), None);
    }

    #[test]
    fn two_d_six_stays_in_range_and_adds_up() {
        let spec = DiceSpec::parse("2d6").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let roll = spec.roll(&mut rng).unwrap();
            assert_eq!(roll.rolls().len(), 2);
            assert!((2..=12).contains(&roll.total()));

            let rendered = roll.to_string();
            let (lhs, rhs) = rendered
                .trim_start_matches("\u{1F3B2} ")
                .split_once(" = ")
                .unwrap();
            let sum: u64 = lhs.split(" + ").map(|n| n.parse::<u64>().unwrap()).sum();
            assert_eq!(sum, rhs.parse::<u64>().unwrap());
            assert_eq!(sum, roll.total());
        }
    }

    #[test]
    fn single_die_renders_without_sum() {
        let mut rng = StdRng::seed_from_u64(1);
        let roll = DiceSpec::default().roll(&mut rng).unwrap();
        assert_eq!(roll.to_string(), format!("\u{1F3B2} {}", roll.total()));
    }

    #[test]
    fn too_many_dice_is_reported() {
        let spec = DiceSpec::parse("200d6").unwrap();
        assert_eq!(spec, DiceSpec { count: 200, sides: 6 });

        let mut rng = StdRng::seed_from_u64(3);
        let err = spec.roll(&mut rng).unwrap_err();
        assert_eq!(err.to_string(), "Can't roll 200 dice at once (at most 100)");

        let most = DiceSpec::parse("100d6").unwrap().roll(&mut rng).unwrap();
        assert_eq!(most.rolls().len(), 100);
    }
}
