use super::types::{Allocation, AllocationStrategy};

pub const FIXED_ALLOCATION: Allocation = Allocation::new(70, 20, 5, 5);

// (exclusive upper age bound, split); the last bucket is open-ended.
const AGE_BUCKETS: [(u32, Allocation); 3] = [
    (35, Allocation::new(80, 10, 5, 5)),
    (45, Allocation::new(70, 20, 5, 5)),
    (55, Allocation::new(60, 25, 10, 5)),
];
const LATE_CAREER_ALLOCATION: Allocation = Allocation::new(45, 35, 10, 10);

impl AllocationStrategy {
    pub fn allocation_for(self, current_age: u32) -> Allocation {
        match self {
            AllocationStrategy::Fixed => FIXED_ALLOCATION,
            AllocationStrategy::AgeBucketed => age_bucketed_allocation(current_age),
        }
    }
}

pub fn age_bucketed_allocation(current_age: u32) -> Allocation {
    AGE_BUCKETS
        .iter()
        .find(|(upper, _)| current_age < *upper)
        .map(|(_, allocation)| *allocation)
        .unwrap_or(LATE_CAREER_ALLOCATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn fixed_strategy_ignores_age() {
        for age in [18, 34, 50, 70] {
            assert_eq!(AllocationStrategy::Fixed.allocation_for(age), FIXED_ALLOCATION);
        }
    }

    #[test]
    fn age_buckets_shift_from_equity_to_bonds() {
        let young = age_bucketed_allocation(28);
        let mid = age_bucketed_allocation(40);
        let late = age_bucketed_allocation(50);
        let near = age_bucketed_allocation(60);

        assert!(young.stocks > mid.stocks);
        assert!(mid.stocks > late.stocks);
        assert!(late.stocks > near.stocks);
        assert!(young.bonds < near.bonds);
    }

    #[test]
    fn bucket_boundaries_are_exclusive_upper_bounds() {
        assert_eq!(age_bucketed_allocation(34).stocks, 80);
        assert_eq!(age_bucketed_allocation(35).stocks, 70);
        assert_eq!(age_bucketed_allocation(44).stocks, 70);
        assert_eq!(age_bucketed_allocation(45).stocks, 60);
        assert_eq!(age_bucketed_allocation(55), LATE_CAREER_ALLOCATION);
    }

    #[test]
    fn strategy_parses_from_web_and_config_spellings() {
        for raw in ["\"age-bucketed\"", "\"ageBucketed\"", "\"age_bucketed\""] {
            let parsed: AllocationStrategy = serde_json::from_str(raw).expect("must parse");
            assert_eq!(parsed, AllocationStrategy::AgeBucketed);
        }
        let parsed: AllocationStrategy = serde_json::from_str("\"fixed\"").expect("must parse");
        assert_eq!(parsed, AllocationStrategy::Fixed);
    }

    proptest! {
        #[test]
        fn prop_every_allocation_sums_to_one_hundred(age in 0u32..130) {
            prop_assert_eq!(AllocationStrategy::Fixed.allocation_for(age).total(), 100);
            prop_assert_eq!(AllocationStrategy::AgeBucketed.allocation_for(age).total(), 100);
        }
    }
}
