use mockbft_core::{
    Validator,
    ValidatorSet,
};

/// Chooses the proposer for a height.
///
/// Selection is a capability interface so hosts can plug in weighted or
/// sticky strategies; the kernel ships round-robin.
pub trait ProposerSelector: Send + Sync {
    /// The proposer for `height`, or `None` if the set is empty (the kernel
    /// rejects the round in that case).
    fn select<'a>(&self, height: i64, validators: &'a ValidatorSet) -> Option<&'a Validator>;
}

/// `validators[height mod N]` over the set's insertion order.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobin;

impl ProposerSelector for RoundRobin {
    fn select<'a>(&self, height: i64, validators: &'a ValidatorSet) -> Option<&'a Validator> {
        let n = i64::try_from(validators.len()).ok()?;
        if n == 0 {
            return None;
        }
        let index = usize::try_from(height.rem_euclid(n)).expect("index fits after rem_euclid");
        validators.get(index)
    }
}

#[cfg(test)]
mod tests {
    use mockbft_core::ValidatorSet;

    use super::*;

    fn set(n: usize) -> ValidatorSet {
        let validators = (0..n)
            .map(|i| Validator::new(format!("val-{i}"), format!("ADDR{i}"), 1))
            .collect();
        ValidatorSet::new(validators).unwrap()
    }

    #[test]
    fn rotates_by_height_mod_n() {
        let validators = set(4);
        let selector = RoundRobin;
        for (height, expected) in [(1, "val-1"), (2, "val-2"), (3, "val-3"), (4, "val-0")] {
            let proposer = selector.select(height, &validators).unwrap();
            assert_eq!(proposer.id().as_str(), expected);
        }
    }

    #[test]
    fn empty_set_has_no_proposer() {
        assert!(RoundRobin.select(1, &set(0)).is_none());
    }
}
