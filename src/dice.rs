//! The `!dice` command: `!dice [count] [sides]`.

use rand::Rng;

pub const MAX_DICE: u32 = 20;
pub const MAX_SIDES: u32 = 1000;

/// A parsed dice request.
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
    /// Parse command arguments. Missing values take the defaults (1d6).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut spec = Self::default();
        if let Some(count) = args.first() {
            spec.count = count
                .parse()
                .map_err(|_| format!("'{}' is not a number of dice", count))?;
        }
        if let Some(sides) = args.get(1) {
            spec.sides = sides
                .parse()
                .map_err(|_| format!("'{}' is not a number of sides", sides))?;
        }
        if spec.count == 0 || spec.count > MAX_DICE {
            return Err(format!("roll between 1 and {} dice", MAX_DICE));
        }
        if spec.sides < 2 || spec.sides > MAX_SIDES {
            return Err(format!("dice need between 2 and {} sides", MAX_SIDES));
        }
        Ok(spec)
    }

    pub fn roll<R: Rng>(&self, rng: &mut R) -> Vec<u32> {
        (0..self.count).map(|_| rng.gen_range(1..=self.sides)).collect()
    }
}

/// Chat reply for a roll.
pub fn format_roll(from: &str, spec: DiceSpec, rolls: &[u32]) -> String {
    let total: u32 = rolls.iter().sum();
    let faces: Vec<String> = rolls.iter().map(|r| r.to_string()).collect();
    format!(
        "{} rolled {}d{}: [{}] = {}",
        from,
        spec.count,
        spec.sides,
        faces.join(", "),
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_to_one_d_six() {
        assert_eq!(DiceSpec::from_args(&[]).unwrap(), DiceSpec { count: 1, sides: 6 });
    }

    #[test]
    fn test_parses_count_and_sides() {
        assert_eq!(
            DiceSpec::from_args(&args(&["2", "6"])).unwrap(),
            DiceSpec { count: 2, sides: 6 }
        );
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(DiceSpec::from_args(&args(&["two"])).is_err());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(DiceSpec::from_args(&args(&["0"])).is_err());
        assert!(DiceSpec::from_args(&args(&["21"])).is_err());
        assert!(DiceSpec::from_args(&args(&["1", "1"])).is_err());
        assert!(DiceSpec::from_args(&args(&["1", "1001"])).is_err());
    }

    #[test]
    fn test_rolls_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = DiceSpec { count: 20, sides: 6 };
        let rolls = spec.roll(&mut rng);
        assert_eq!(rolls.len(), 20);
        assert!(rolls.iter().all(|r| (1..=6).contains(r)));
    }

    #[test]
    fn test_format_roll() {
        let text = format_roll("alice", DiceSpec { count: 2, sides: 6 }, &[3, 4]);
        assert_eq!(text, "alice rolled 2d6: [3, 4] = 7");
    }
}
