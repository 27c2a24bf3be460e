//! Concrete grouping strategy: assets are grouped by a configured level of
//! their Unified Namespace (UNS) path (e.g. "workcenter"), backed by a
//! ksqlDB table joining the asset stream to a UNS map table.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::{AssetUuid, GroupName};
use crate::error::{CoreError, CoreResult};
use crate::grouping::{GroupingStrategy, Readiness};
use crate::ksql::{escape_ksql_literal, KsqlClient};

pub struct UnsLevelGroupingStrategy {
    ksql: KsqlClient,
    assets_stream: String,
    assets_table: String,
    uns_map_table: String,
    grouping_level: String,
}

impl UnsLevelGroupingStrategy {
    /// Constructs the strategy, validating at construction time (not on
    /// first use) that the backing table is reachable and declares the
    /// configured grouping level as a column.
    pub async fn connect(
        ksqldb_url: impl Into<String>,
        assets_stream: impl Into<String>,
        assets_table: impl Into<String>,
        uns_map_table: impl Into<String>,
        grouping_level: impl Into<String>,
    ) -> CoreResult<Self> {
        let strategy = Self {
            ksql: KsqlClient::new(ksqldb_url),
            assets_stream: assets_stream.into(),
            assets_table: assets_table.into(),
            uns_map_table: uns_map_table.into(),
            grouping_level: grouping_level.into(),
        };
        let (ready, issue) = strategy.ready().await;
        if !ready {
            return Err(CoreError::BackendUnreachable {
                message: issue.unwrap_or_else(|| "ksqlDB not ready".to_string()),
            });
        }
        Ok(strategy)
    }

    fn derived_stream_name(&self, group: &GroupName) -> String {
        format!("{}_STREAM", group.sanitized().to_uppercase())
    }
}

fn column_values(rows: &serde_json::Value, column: &str) -> Vec<String> {
    rows.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|row| row.get(column).or_else(|| row.get("row").and_then(|r| r.get(column))))
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl GroupingStrategy for UnsLevelGroupingStrategy {
    async fn group_of(&self, asset: &AssetUuid) -> CoreResult<Option<GroupName>> {
        let asset_lit = escape_ksql_literal(asset.as_str());
        let sql = format!(
            "SELECT {level} AS GRP FROM {table} WHERE ASSET_UUID = '{asset}';",
            level = self.grouping_level,
            table = self.assets_table,
            asset = asset_lit,
        );
        let rows = self.ksql.query(&sql).await?;
        let values = column_values(&rows, "GRP");
        match values.into_iter().next() {
            Some(value) => Ok(GroupName::parse(value)),
            None => Ok(None),
        }
    }

    async fn all_groups(&self) -> CoreResult<HashSet<GroupName>> {
        let sql = format!(
            "SELECT DISTINCT {level} AS GRP FROM {table};",
            level = self.grouping_level,
            table = self.assets_table,
        );
        let rows = self.ksql.query(&sql).await?;
        Ok(column_values(&rows, "GRP")
            .into_iter()
            .filter_map(GroupName::parse)
            .collect())
    }

    async fn assets_in(&self, group: &GroupName) -> CoreResult<HashSet<AssetUuid>> {
        let group_lit = escape_ksql_literal(group.as_str());
        let sql = format!(
            "SELECT ASSET_UUID FROM {table} WHERE {level} = '{group}';",
            table = self.assets_table,
            level = self.grouping_level,
            group = group_lit,
        );
        let rows = self.ksql.query(&sql).await?;
        Ok(column_values(&rows, "ASSET_UUID")
            .into_iter()
            .filter_map(AssetUuid::parse)
            .collect())
    }

    async fn create_derived_stream(&self, group: &GroupName) -> CoreResult<()> {
        let group_lit = escape_ksql_literal(group.as_str());
        let stream_name = self.derived_stream_name(group);
        let ksql = format!(
            "CREATE STREAM IF NOT EXISTS {stream} WITH (KAFKA_TOPIC='{topic}', VALUE_FORMAT='JSON') \
             AS SELECT a.* FROM {assets_stream} a JOIN {uns_map} m ON a.ASSET_UUID = m.ASSET_UUID \
             WHERE m.{level} = '{group}';",
            stream = stream_name,
            topic = self.derived_stream_topic(group),
            assets_stream = self.assets_stream,
            uns_map = self.uns_map_table,
            level = self.grouping_level,
            group = group_lit,
        );
        self.ksql.statement(&ksql).await?;
        Ok(())
    }

    async fn remove_derived_stream(&self, group: &GroupName) -> CoreResult<()> {
        let stream_name = self.derived_stream_name(group);
        let ksql = format!("DROP STREAM IF EXISTS {stream_name} DELETE TOPIC;");
        self.ksql.statement(&ksql).await?;
        Ok(())
    }

    fn derived_stream_topic(&self, group: &GroupName) -> String {
        self.derived_stream_name(group).to_lowercase()
    }

    fn derived_stream_consumer_group(&self, group: &GroupName) -> String {
        format!("{}-consumer-group", self.derived_stream_topic(group))
    }

    async fn ready(&self) -> Readiness {
        match self.ksql.statement("SHOW TABLES;").await {
            Ok(rows) => {
                let names = column_values(&rows, "name");
                if names
                    .iter()
                    .any(|n| n.eq_ignore_ascii_case(&self.assets_table))
                {
                    (true, None)
                } else {
                    (
                        false,
                        Some(format!("table '{}' not found in ksqlDB", self.assets_table)),
                    )
                }
            }
            Err(err) => (false, Some(err.to_string())),
        }
    }
}
