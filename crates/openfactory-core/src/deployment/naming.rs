//! Instance naming conventions for deployed services.

use crate::domain::GroupName;

pub const STATE_API_INSTANCE_NAME: &str = "openfactory-state-api";

pub fn stream_api_instance_name(group: &GroupName) -> String {
    format!("stream-api-group-{}", group.sanitized())
}

/// The front-end's own instance name. Single-host deployments use a
/// hyphenated name; cluster services use underscores, matching the
/// `local` Docker-container vs. Swarm-service naming split.
pub fn routing_api_instance_name(clustered: bool) -> &'static str {
    if clustered {
        "serving_layer_router"
    } else {
        "serving-layer-router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_api_name_uses_sanitized_group() {
        let group = GroupName::parse("Press Line A").unwrap();
        assert_eq!(stream_api_instance_name(&group), "stream-api-group-press-line-a");
    }

    #[test]
    fn routing_api_name_differs_by_topology() {
        assert_eq!(routing_api_instance_name(false), "serving-layer-router");
        assert_eq!(routing_api_instance_name(true), "serving_layer_router");
    }
}
