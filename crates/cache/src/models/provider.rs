use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use sieve_extract::Registration;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProviderRow {
    pub(crate) name: String,
    pub(crate) media_types: String,
    pub(crate) keys: String,
    pub(crate) priority: i64,
    pub(crate) enabled: bool,
}
impl TryFrom<&Registration> for ProviderRow {
    type Error = Error;
    fn try_from(registration: &Registration) -> Result<Self, Self::Error> {
        Ok(Self {
            name: registration.name.clone(),
            media_types: serde_json::to_string(&registration.media_types)
                .or_raise(|| ErrorKind::InvalidData("media types"))?,
            keys: serde_json::to_string(&registration.keys).or_raise(|| ErrorKind::InvalidData("keys"))?,
            priority: i64::from(registration.priority),
            enabled: registration.enabled,
        })
    }
}
impl TryFrom<ProviderRow> for Registration {
    type Error = Error;
    fn try_from(row: ProviderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            media_types: serde_json::from_str(&row.media_types).or_raise(|| ErrorKind::InvalidData("media types"))?,
            keys: serde_json::from_str(&row.keys).or_raise(|| ErrorKind::InvalidData("keys"))?,
            priority: i32::try_from(row.priority).or_raise(|| ErrorKind::InvalidData("priority"))?,
            name: row.name,
            enabled: row.enabled,
        })
    }
}
