//! Minimal ksqlDB REST client and the mandatory literal-escaping discipline.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Doubles single quotes so a value is safe to interpolate into a ksqlDB
/// statement literal. Mandatory for every interpolated value; never skip
/// this even for values that "look safe".
pub fn escape_ksql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Thin REST client over ksqlDB's `/ksql` (DDL/DML + `SHOW` statements) and
/// `/query` (pull queries) endpoints.
pub struct KsqlClient {
    base_url: String,
    http: reqwest::Client,
}

impl KsqlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Executes a statement (`CREATE STREAM ...`, `DROP STREAM ...`,
    /// `SHOW TABLES;`, ...) against `/ksql` and returns the parsed JSON
    /// response array.
    pub async fn statement(&self, ksql: &str) -> CoreResult<Value> {
        let body = serde_json::json!({
            "ksql": ksql,
            "streamsProperties": {},
        });
        let resp = self
            .http
            .post(format!("{}/ksql", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::external_service(
                "ksqldb",
                format!("statement failed ({status}): {text}"),
            ));
        }
        Ok(resp.json::<Value>().await?)
    }

    /// Executes a pull query against `/query` and returns the parsed JSON
    /// response array (rows, one JSON object per line/element depending on
    /// the ksqlDB version's wire format).
    pub async fn query(&self, sql: &str) -> CoreResult<Value> {
        let body = serde_json::json!({ "ksql": sql, "streamsProperties": {} });
        let resp = self
            .http
            .post(format!("{}/query", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::external_service(
                "ksqldb",
                format!("query failed ({status}): {text}"),
            ));
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    #[case("o'brien", "o''brien")]
    #[case("plain", "plain")]
    #[case("a''b", "a''''b")]
    #[case("", "")]
    fn doubles_single_quotes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_ksql_literal(input), expected);
    }

    #[tokio::test]
    async fn statement_returns_parsed_json_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ksql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"ok": true}])))
            .mount(&server)
            .await;

        let client = KsqlClient::new(server.uri());
        let result = client.statement("SHOW STREAMS;").await.unwrap();
        assert_eq!(result, serde_json::json!([{"ok": true}]));
    }

    #[tokio::test]
    async fn statement_surfaces_non_success_status_as_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ksql"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad statement"))
            .mount(&server)
            .await;

        let client = KsqlClient::new(server.uri());
        let err = client.statement("NOT VALID KSQL").await.unwrap_err();
        assert!(matches!(err, CoreError::ExternalService { .. }));
    }
}
