use std::fmt;

/// Identifier of a validator within a single orderer instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatorId(String);

impl ValidatorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ValidatorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A consensus participant. Validators are stable for the lifetime of an
/// orderer instance; there is no set rotation at this layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    id: ValidatorId,
    address: String,
    voting_power: i64,
}

impl Validator {
    #[must_use]
    pub fn new(id: impl Into<ValidatorId>, address: impl Into<String>, voting_power: i64) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            voting_power,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ValidatorId {
        &self.id
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn voting_power(&self) -> i64 {
        self.voting_power
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidatorSetError {
    #[error("validator `{id}` has non-positive voting power {power}")]
    NonPositivePower { id: ValidatorId, power: i64 },
    #[error("duplicate validator id `{id}`")]
    DuplicateId { id: ValidatorId },
}

/// An ordered validator set with precomputed total voting power.
///
/// The insertion order is the sole input to proposer rotation, so it is
/// preserved exactly as given. An empty set is constructible; rounds against
/// an empty set are rejected by the proposer selector.
#[derive(Clone, Debug)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_power: i64,
}

impl ValidatorSet {
    /// Builds a set from the given validators, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an error if any validator has a non-positive voting power or
    /// if two validators share an id.
    pub fn new(validators: Vec<Validator>) -> Result<Self, ValidatorSetError> {
        let mut total_power: i64 = 0;
        for (i, validator) in validators.iter().enumerate() {
            if validator.voting_power <= 0 {
                return Err(ValidatorSetError::NonPositivePower {
                    id: validator.id.clone(),
                    power: validator.voting_power,
                });
            }
            if validators[..i].iter().any(|v| v.id == validator.id) {
                return Err(ValidatorSetError::DuplicateId {
                    id: validator.id.clone(),
                });
            }
            total_power += validator.voting_power;
        }
        Ok(Self {
            validators,
            total_power,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Validator> {
        self.validators.iter()
    }

    #[must_use]
    pub fn total_power(&self) -> i64 {
        self.total_power
    }

    #[must_use]
    pub fn power_of(&self, id: &ValidatorId) -> Option<i64> {
        self.validators
            .iter()
            .find(|v| v.id == *id)
            .map(Validator::voting_power)
    }

    /// True if `power` is strictly greater than two thirds of the total
    /// voting power, i.e. `power > floor(2 * total / 3)`.
    #[must_use]
    pub fn gte_two_thirds(&self, power: i64) -> bool {
        i128::from(power) > i128::from(self.total_power) * 2 / 3
    }

    /// True if `power` is strictly greater than one tenth of the total voting
    /// power. Used as the prevote liveness floor.
    #[must_use]
    pub fn gte_one_tenth(&self, power: i64) -> bool {
        i128::from(power) > i128::from(self.total_power) / 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(powers: &[i64]) -> ValidatorSet {
        let validators = powers
            .iter()
            .enumerate()
            .map(|(i, power)| Validator::new(format!("val-{i}"), format!("ADDR{i}"), *power))
            .collect();
        ValidatorSet::new(validators).unwrap()
    }

    #[test]
    fn two_thirds_threshold_is_strict() {
        // total 10, floor(20 / 3) = 6: six is not enough, seven is.
        let validators = set(&[3, 3, 3, 1]);
        assert_eq!(validators.total_power(), 10);
        assert!(!validators.gte_two_thirds(6));
        assert!(validators.gte_two_thirds(7));
    }

    #[test]
    fn one_tenth_threshold_is_strict() {
        let validators = set(&[3, 3, 3, 1]);
        assert!(!validators.gte_one_tenth(1));
        assert!(validators.gte_one_tenth(2));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let validators = set(&[1, 2, 3]);
        let ids: Vec<_> = validators.iter().map(|v| v.id().to_string()).collect();
        assert_eq!(ids, ["val-0", "val-1", "val-2"]);
    }

    #[test]
    fn rejects_non_positive_power() {
        let err = ValidatorSet::new(vec![Validator::new("a", "A", 0)]).unwrap_err();
        assert!(matches!(
            err,
            ValidatorSetError::NonPositivePower { power: 0, .. }
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = ValidatorSet::new(vec![
            Validator::new("a", "A", 1),
            Validator::new("a", "B", 2),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidatorSetError::DuplicateId { .. }));
    }

    #[test]
    fn empty_set_is_constructible() {
        let validators = ValidatorSet::new(Vec::new()).unwrap();
        assert!(validators.is_empty());
        assert_eq!(validators.total_power(), 0);
    }
}
