use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use check_relay_core::contract::ConnectionRecord;

#[async_trait]
pub trait ConnectionTable: Send + Sync {
    async fn put(&self, record: &ConnectionRecord) -> Result<(), String>;

    /// Connection ids subscribed to a check.
    async fn connections_for(&self, check_id: &str) -> Result<Vec<String>, String>;
}

#[derive(Clone)]
pub struct DynamoConnectionTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoConnectionTable {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl ConnectionTable for DynamoConnectionTable {
    async fn put(&self, record: &ConnectionRecord) -> Result<(), String> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(
                "connectionId",
                AttributeValue::S(record.connection_id.clone()),
            )
            .item("checkId", AttributeValue::S(record.check_id.clone()))
            .item("ttl", AttributeValue::N(record.ttl.to_string()))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to store connection record: {error}"))
    }

    async fn connections_for(&self, check_id: &str) -> Result<Vec<String>, String> {
        let items: Vec<HashMap<String, AttributeValue>> = self
            .client
            .scan()
            .table_name(&self.table_name)
            .projection_expression("connectionId")
            .filter_expression("checkId = :checkId")
            .expression_attribute_values(":checkId", AttributeValue::S(check_id.to_string()))
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|error| format!("failed to scan connection table: {error}"))?;

        Ok(connection_ids(&items))
    }
}

fn connection_ids(items: &[HashMap<String, AttributeValue>]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get("connectionId"))
        .filter_map(|value| value.as_s().ok())
        .cloned()
        .collect()
}
