/// What a given backend call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Produce the passage from the generation prompt.
    Generate,
    /// Reformat a previous malformed response without changing its content.
    Reformat,
}

impl Attempt {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Reformat => "reformat",
        }
    }
}

/// Bounded retry policy for obtaining a well-formed generation result.
///
/// Attempt 1 always generates; every later attempt up to `max_attempts`
/// reformats the previous response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    max_attempts: u32,
}

impl RepairPolicy {
    pub const fn single_repair() -> Self {
        Self { max_attempts: 2 }
    }

    pub fn max_attempts(self) -> u32 {
        self.max_attempts
    }

    /// The kind of the 1-based attempt `number`, or `None` once exhausted.
    pub fn attempt(self, number: u32) -> Option<Attempt> {
        match number {
            0 => None,
            1 => Some(Attempt::Generate),
            n if n <= self.max_attempts => Some(Attempt::Reformat),
            _ => None,
        }
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::single_repair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_repair_allows_generate_then_one_reformat() {
        let policy = RepairPolicy::single_repair();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.attempt(1), Some(Attempt::Generate));
        assert_eq!(policy.attempt(2), Some(Attempt::Reformat));
        assert_eq!(policy.attempt(3), None);
    }

    #[test]
    fn attempt_numbers_are_one_based() {
        assert_eq!(RepairPolicy::default().attempt(0), None);
    }
}
