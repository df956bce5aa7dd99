//! sea-orm entities backing the storefront collections.

use serde::{Deserialize, Serialize};
use sea_orm::FromJsonQueryResult;

pub mod car;
pub mod category;
pub mod product;

/// Ordered list of text values stored in a single JSON column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

/// Production years of a car, kept sorted and de-duplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct YearList(pub Vec<i32>);

impl YearList {
    /// Sorts and de-duplicates the given years.
    pub fn normalized(mut years: Vec<i32>) -> Self {
        years.sort_unstable();
        years.dedup();
        YearList(years)
    }

    pub fn overlaps(&self, other: &YearList) -> bool {
        self.0.iter().any(|year| other.0.binary_search(year).is_ok())
    }

    pub fn contains(&self, year: i32) -> bool {
        self.0.binary_search(&year).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_sorts_and_dedups() {
        assert_eq!(
            YearList::normalized(vec![2012, 2010, 2012, 2011]).0,
            vec![2010, 2011, 2012]
        );
    }

    #[test]
    fn overlap_detection() {
        let a = YearList::normalized(vec![2010, 2011]);
        assert!(a.overlaps(&YearList::normalized(vec![2011, 2012])));
        assert!(!a.overlaps(&YearList::normalized(vec![2013])));
        assert!(a.contains(2010));
        assert!(!a.contains(2009));
    }
}
