use std::sync::Arc;

use wattmon_group::{Group, GroupConfig, Rank};
use wattmon_wire::RecordSchema;

/// Process-lifetime ownership of the group membership and the wire-type
/// registry: rank, size and schema are fixed from startup to shutdown.
pub struct ClusterContext {
    pub(crate) group: Group,
    pub(crate) schema: Arc<RecordSchema>,
}

impl ClusterContext {
    /// Builds the schema registry and joins the group, in that order: a
    /// record layout that cannot be described exactly must fail before any
    /// peer starts waiting on this process.
    pub async fn establish(config: &GroupConfig) -> anyhow::Result<Self> {
        let schema = Arc::new(RecordSchema::build()?);
        tracing::info!(
            version = schema.version(),
            record_bytes = schema.encoded_len(),
            "wire schema registered"
        );
        let group = Group::join(config).await?;
        Ok(Self { group, schema })
    }

    pub fn rank(&self) -> Rank {
        self.group.rank()
    }

    pub fn size(&self) -> u32 {
        self.group.size()
    }

    pub fn is_coordinator(&self) -> bool {
        self.group.is_coordinator()
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Releases the wire registry and leaves the group, the mirror image of
    /// [`ClusterContext::establish`]. An abnormal exit skips this, which is
    /// accepted.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.group.leave().await?;
        Ok(())
    }
}
