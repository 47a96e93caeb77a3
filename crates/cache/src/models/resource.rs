use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use sieve_resource::{Resource, ResourceKind};
use time::UtcDateTime;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ResourceRow {
    pub(crate) id: String,
    pub(crate) kind: String,
    pub(crate) size: i64,
    pub(crate) media_type: String,
    pub(crate) checksum: Option<String>,
    pub(crate) last_processed: i64,
}
impl TryFrom<&Resource> for ResourceRow {
    type Error = Error;
    fn try_from(resource: &Resource) -> Result<Self, Self::Error> {
        Ok(Self {
            id: resource.id.clone(),
            kind: resource.kind.to_string(),
            size: i64::try_from(resource.size).or_raise(|| ErrorKind::InvalidData("resource size"))?,
            media_type: resource.media_type.clone(),
            checksum: resource.checksum.clone(),
            last_processed: resource.last_processed.unix_timestamp(),
        })
    }
}
impl TryFrom<ResourceRow> for Resource {
    type Error = Error;
    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: row
                .kind
                .parse::<ResourceKind>()
                .map_err(|_| ErrorKind::InvalidData("resource kind"))?,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("resource size"))?,
            last_processed: UtcDateTime::from_unix_timestamp(row.last_processed)
                .or_raise(|| ErrorKind::InvalidData("last processed"))?,
            id: row.id,
            media_type: row.media_type,
            checksum: row.checksum,
        })
    }
}
