//! C1 — Group Registry / Strategy.

mod uns_level;

pub use uns_level::UnsLevelGroupingStrategy;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::{AssetUuid, GroupName};
use crate::error::CoreResult;

/// Readiness result: ready flag plus a human-readable diagnostic when not.
pub type Readiness = (bool, Option<String>);

/// Polymorphic interface for resolving assets to groups and managing the
/// per-group derived event stream on the change-stream engine. Concrete
/// strategies differ only in how the group mapping and derived streams are
/// actually backed (ksqlDB table vs. some other registry).
#[async_trait]
pub trait GroupingStrategy: Send + Sync {
    async fn group_of(&self, asset: &AssetUuid) -> CoreResult<Option<GroupName>>;

    async fn all_groups(&self) -> CoreResult<HashSet<GroupName>>;

    async fn assets_in(&self, group: &GroupName) -> CoreResult<HashSet<AssetUuid>>;

    /// Idempotent: ensures a filter-and-project stream exists for `group`.
    async fn create_derived_stream(&self, group: &GroupName) -> CoreResult<()>;

    /// Idempotent: drops the derived stream and its backing topic/log.
    async fn remove_derived_stream(&self, group: &GroupName) -> CoreResult<()>;

    /// The Kafka topic backing `group`'s derived stream, as created by
    /// `create_derived_stream`. Deployment backends inject this into the
    /// group's serving instance so it consumes its own stream rather than
    /// another group's.
    fn derived_stream_topic(&self, group: &GroupName) -> String;

    /// The consumer group id the group's serving instance should join when
    /// reading `derived_stream_topic`.
    fn derived_stream_consumer_group(&self, group: &GroupName) -> String;

    async fn ready(&self) -> Readiness;
}
