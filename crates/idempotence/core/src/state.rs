//! Idempotent configuration records.
//!
//! State is passed explicitly: the record is owned by the caller and handed to
//! [`apply_idempotent`] by reference, which only mutates when the proposed
//! value differs from the current one.

use serde::{Deserialize, Serialize};

/// A configuration value plus the number of times it actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord<T = String> {
    pub value: T,
    pub change_count: u64,
}

impl<T: PartialEq> ConfigRecord<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            change_count: 0,
        }
    }

    /// Set `value`; returns whether anything changed.
    pub fn apply(&mut self, value: T) -> bool {
        apply_idempotent(self, value)
    }
}

impl<T: Default + PartialEq> Default for ConfigRecord<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Compare `proposed` with the current value and mutate only on difference.
pub fn apply_idempotent<T: PartialEq>(record: &mut ConfigRecord<T>, proposed: T) -> bool {
    if record.value == proposed {
        return false;
    }
    record.value = proposed;
    record.change_count += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_value_counts_once() {
        let mut config = ConfigRecord::new("initial".to_string());
        assert!(config.apply("configured".to_string()));
        assert!(!config.apply("configured".to_string()));
        assert!(!config.apply("configured".to_string()));
        assert_eq!(config.value, "configured");
        assert_eq!(config.change_count, 1);
    }

    #[test]
    fn test_applying_current_value_is_noop() {
        let mut config = ConfigRecord::new(42u32);
        assert!(!apply_idempotent(&mut config, 42));
        assert_eq!(config.change_count, 0);
    }

    #[test]
    fn test_distinct_values_each_count() {
        let mut config = ConfigRecord::<String>::default();
        config.apply("a".into());
        config.apply("b".into());
        config.apply("b".into());
        assert_eq!(config.change_count, 2);
    }

    proptest! {
        #[test]
        fn prop_repeated_apply_changes_once(
            initial in "[a-z]{0,8}",
            proposed in "[a-z]{0,8}",
            repeats in 1usize..20,
        ) {
            prop_assume!(initial != proposed);
            let mut config = ConfigRecord::new(initial);
            for _ in 0..repeats {
                config.apply(proposed.clone());
            }
            prop_assert_eq!(config.change_count, 1);
            prop_assert_eq!(config.value, proposed);
        }
    }
}
