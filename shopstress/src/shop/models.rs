use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinRequest<'a> {
    pub to_user: &'a str,
    pub amount: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub coins: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub coin_history: CoinHistory,
}

impl InfoResponse {
    /// Quantity of `item` held, zero if absent.
    pub fn quantity(&self, item: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|i| i.kind == item)
            .map(|i| i.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CoinHistory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub received: Vec<CoinTransaction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sent: Vec<CoinTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoinTransaction {
    pub user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub errors: String,
}

// The service encodes empty lists as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
