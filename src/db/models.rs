use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub linked_account: String,
    pub text: String,
    pub create_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub name: String,
    pub pin_type: Option<i64>,
    pub rating: Option<String>,
    pub cost: Option<f64>,
    pub description: Option<String>,
    pub image: String,
    pub review: String,
    pub coordinate: Option<Coordinate>,
    pub linked_account: Option<String>,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub disliked_by: Vec<String>,
    pub comments: Vec<Comment>,
    /// None means the pin never expires
    pub expire_at: Option<String>,
    pub create_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPin {
    #[serde(default)]
    pub name: String,
    pub pin_type: Option<i64>,
    pub rating: Option<String>,
    pub cost: Option<f64>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub review: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub linked_account: Option<String>,
    pub expire_at: Option<DateTime<Utc>>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinUpdate {
    pub name: Option<String>,
    pub pin_type: Option<i64>,
    pub rating: Option<String>,
    pub cost: Option<f64>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub review: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub linked_account: Option<String>,
    /// Absent keeps the stored value; `null` makes the pin never expire.
    #[serde(default, deserialize_with = "present")]
    pub expire_at: Option<Option<DateTime<Utc>>>,
}

/// Any value that is present, `null` included, becomes `Some`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub auth_id: Option<String>,
    pub username: String,
    pub num_seeds: i64,
    pub num_pins: i64,
    pub my_trips: Vec<String>,
    /// Most recent first
    pub feed: Vec<String>,
    pub create_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(default)]
    pub username: String,
    pub auth_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub num_seeds: Option<i64>,
    pub num_pins: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TripType {
    Outdoor,
    Attractions,
    Foodie,
}

impl TryFrom<i64> for TripType {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TripType::Outdoor),
            2 => Ok(TripType::Attractions),
            3 => Ok(TripType::Foodie),
            other => Err(format!("unknown trip type {}", other)),
        }
    }
}

impl From<TripType> for i64 {
    fn from(value: TripType) -> Self {
        match value {
            TripType::Outdoor => 1,
            TripType::Attractions => 2,
            TripType::Foodie => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub trip_type: Option<TripType>,
    /// In trip order
    pub pins: Vec<Pin>,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub disliked_by: Vec<String>,
    /// Mean of all submitted ratings, None until the first one
    pub rating: Option<f64>,
    pub num_ratings: i64,
    pub linked_account: Option<String>,
    pub create_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub trip_type: Option<TripType>,
    #[serde(default)]
    pub pins: Vec<String>,
    pub linked_account: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub trip_type: Option<TripType>,
    pub pins: Option<Vec<String>>,
    pub linked_account: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_type_serializes_as_integer() {
        let json = serde_json::to_value(TripType::Foodie).unwrap();
        assert_eq!(json, serde_json::json!(3));
        let parsed: TripType = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(parsed, TripType::Outdoor);
    }

    #[test]
    fn unknown_trip_type_is_rejected() {
        let parsed: Result<NewTrip, _> =
            serde_json::from_value(serde_json::json!({ "name": "x", "type": 9 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn pin_update_distinguishes_null_from_absent_expiry() {
        let absent: PinUpdate = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(absent.expire_at, None);

        let cleared: PinUpdate =
            serde_json::from_value(serde_json::json!({ "expireAt": null })).unwrap();
        assert_eq!(cleared.expire_at, Some(None));

        let set: PinUpdate =
            serde_json::from_value(serde_json::json!({ "expireAt": "2016-11-20T22:00:00Z" }))
                .unwrap();
        assert!(matches!(set.expire_at, Some(Some(_))));
    }

    #[test]
    fn new_pin_accepts_partial_camel_case_body() {
        let pin: NewPin = serde_json::from_value(serde_json::json!({
            "name": "Lookout",
            "pinType": 2,
            "linkedAccount": "acct-1",
            "expireAt": "2016-11-20T22:00:00.000Z",
            "coordinate": { "latitude": 49.2, "longitude": -123.1 }
        }))
        .unwrap();
        assert_eq!(pin.pin_type, Some(2));
        assert_eq!(pin.linked_account.as_deref(), Some("acct-1"));
        assert!(pin.expire_at.is_some());
        assert!(pin.cost.is_none());
    }
}
