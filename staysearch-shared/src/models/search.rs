use serde::{Deserialize, Serialize};

/// What a guest searched for. Two searches are "the same" only when every
/// field matches, `ages` included in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub hotel_id: String,
    pub check_in: String,  // dd/MM/yyyy
    pub check_out: String, // dd/MM/yyyy
    #[serde(default)]
    pub ages: Vec<u32>,
}

impl SearchCriteria {
    pub fn new(
        hotel_id: impl Into<String>,
        check_in: impl Into<String>,
        check_out: impl Into<String>,
        ages: Vec<u32>,
    ) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            check_in: check_in.into(),
            check_out: check_out.into(),
            ages,
        }
    }
}

/// A persisted search. Keyed by `id`, never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    pub criteria: SearchCriteria,
}

impl SearchRecord {
    pub fn new(id: impl Into<String>, criteria: SearchCriteria) -> Self {
        Self {
            id: id.into(),
            criteria,
        }
    }
}

/// Response of a count lookup: the stored search plus how many stored
/// searches (itself included) share its criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCountResult {
    pub search_id: String,
    pub search: SearchCriteria,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_equality_is_order_sensitive() {
        let a = SearchCriteria::new("1234", "29/12/2023", "12/01/2024", vec![12, 32]);
        let b = SearchCriteria::new("1234", "29/12/2023", "12/01/2024", vec![32, 12]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_count_result_json_shape() {
        let result = SearchCountResult {
            search_id: "abc".to_string(),
            search: SearchCriteria::new("1234", "29/12/2023", "12/01/2024", vec![3]),
            count: 2,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["searchId"], "abc");
        assert_eq!(json["search"]["hotelId"], "1234");
        assert_eq!(json["search"]["checkOut"], "12/01/2024");
        assert_eq!(json["count"], 2);
    }
}
