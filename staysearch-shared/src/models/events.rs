use serde::{Deserialize, Deserializer, Serialize};
use crate::models::search::{SearchCriteria, SearchRecord};

/// Wire form of a submitted search, as carried on the event channel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchEvent {
    pub hotel_id: String,
    pub check_in: String,
    pub check_out: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ages: Vec<u32>,
    pub search_id: String,
}

impl SearchEvent {
    pub fn new(search_id: impl Into<String>, criteria: SearchCriteria) -> Self {
        Self {
            hotel_id: criteria.hotel_id,
            check_in: criteria.check_in,
            check_out: criteria.check_out,
            ages: criteria.ages,
            search_id: search_id.into(),
        }
    }

    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            hotel_id: self.hotel_id.clone(),
            check_in: self.check_in.clone(),
            check_out: self.check_out.clone(),
            ages: self.ages.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

impl From<SearchEvent> for SearchRecord {
    fn from(event: SearchEvent) -> Self {
        SearchRecord {
            id: event.search_id,
            criteria: SearchCriteria {
                hotel_id: event.hotel_id,
                check_in: event.check_in,
                check_out: event.check_out,
                ages: event.ages,
            },
        }
    }
}

// Older producers sent `"ages": null` for guest-less searches.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<u32>>::deserialize(deserializer)?.unwrap_or_default())
}
