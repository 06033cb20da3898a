//! Shared plumbing for the DynamoDB repositories: client spans, SDK error
//! mapping and attribute conversions.

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{error, Instrument};

use crate::models::{RepositoryError, RepositoryResult};

pub type Item = HashMap<String, AttributeValue>;

/// Create a DynamoDB subsegment span with X-Ray compatible attributes
pub(crate) fn dynamodb_span(operation: &str, table_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "AmazonDynamoDBv2",
        "rpc.method" = operation,
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
        "http.status_code" = tracing::field::Empty,
    )
}

/// Record the outcome of an SDK call on the current DynamoDB span
pub(crate) fn record_outcome<T, E>(result: &Result<T, SdkError<E, HttpResponse>>)
where
    T: aws_sdk_dynamodb::operation::RequestId,
{
    let span = tracing::Span::current();
    match result {
        Ok(output) => {
            span.record("http.status_code", 200);
            if let Some(request_id) = output.request_id() {
                span.record("aws.request_id", request_id);
            }
        }
        Err(SdkError::ServiceError(service_error)) => {
            span.record("http.status_code", service_error.raw().status().as_u16());
        }
        Err(_) => {}
    }
}

/// Convert an SDK error into a `RepositoryError`.
///
/// `ConditionalCheckFailedException` becomes `ConditionFailed`; the caller
/// knows which condition it wrote and refines it (for example into
/// `AlreadyExists`).
pub(crate) fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, table_name: &str) -> RepositoryError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => {
            error!(table = %table_name, "DynamoDB request timed out");
            return RepositoryError::Timeout;
        }
        SdkError::DispatchFailure(failure) => {
            error!(table = %table_name, error = ?failure, "DynamoDB dispatch failure");
            return RepositoryError::ConnectionFailed;
        }
        _ => {}
    }

    let code = err.code().map(str::to_string);
    error!(
        table = %table_name,
        code = code.as_deref().unwrap_or("unknown"),
        error = ?err,
        "DynamoDB error"
    );

    match code.as_deref() {
        Some("ConditionalCheckFailedException") => RepositoryError::ConditionFailed,
        Some("ResourceNotFoundException") => RepositoryError::TableNotFound {
            table_name: table_name.to_string(),
        },
        Some("ProvisionedThroughputExceededException")
        | Some("RequestLimitExceeded")
        | Some("ThrottlingException") => RepositoryError::RateLimitExceeded,
        _ => RepositoryError::AwsSdk {
            message: err.to_string(),
        },
    }
}

/// Indexes of the transaction items whose condition failed, if the
/// transaction was cancelled because of conditions.
pub(crate) fn failed_conditions(
    err: &SdkError<TransactWriteItemsError, HttpResponse>,
) -> Option<Vec<usize>> {
    let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
        err.as_service_error()
    else {
        return None;
    };

    let failed: Vec<usize> = cancelled
        .cancellation_reasons()
        .iter()
        .enumerate()
        .filter(|(_, reason)| reason.code() == Some("ConditionalCheckFailed"))
        .map(|(index, _)| index)
        .collect();

    if failed.is_empty() {
        None
    } else {
        Some(failed)
    }
}

/// Equality filter applied to a scan
pub(crate) struct ScanFilter {
    attribute: String,
    value: AttributeValue,
}

impl ScanFilter {
    pub fn equals(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }
}

/// Scan a table to exhaustion, following `LastEvaluatedKey` across pages
pub(crate) async fn scan_all(
    client: &DynamoDbClient,
    table_name: &str,
    region: &str,
    filter: Option<&ScanFilter>,
    projection: Option<&str>,
) -> RepositoryResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let mut request = client
            .scan()
            .table_name(table_name)
            .set_exclusive_start_key(start_key.take())
            .set_projection_expression(projection.map(str::to_string));

        if let Some(filter) = filter {
            request = request
                .filter_expression("#attr = :value")
                .expression_attribute_names("#attr", &filter.attribute)
                .expression_attribute_values(":value", filter.value.clone());
        }

        let scan_span = dynamodb_span("Scan", table_name, region);
        let response = async {
            let result = request.send().await;
            record_outcome(&result);
            result.map_err(|e| map_sdk_error(e, table_name))
        }
        .instrument(scan_span)
        .await?;

        items.extend(response.items.unwrap_or_default());

        match response.last_evaluated_key {
            Some(key) if !key.is_empty() => start_key = Some(key),
            _ => break,
        }
    }

    Ok(items)
}

pub(crate) fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub(crate) fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub(crate) fn required_s(item: &Item, name: &str) -> RepositoryResult<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Missing {}", name),
        })
}

pub(crate) fn optional_s(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

pub(crate) fn required_n<T: FromStr>(item: &Item, name: &str) -> RepositoryResult<T> {
    optional_n(item, name).ok_or_else(|| RepositoryError::InvalidItem {
        message: format!("Missing or invalid {}", name),
    })
}

pub(crate) fn optional_n<T: FromStr>(item: &Item, name: &str) -> Option<T> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|raw| raw.parse().ok())
}

/// Read a list of numbers, treating a missing attribute as empty
pub(crate) fn number_list(item: &Item, name: &str) -> RepositoryResult<Vec<u64>> {
    let Some(value) = item.get(name) else {
        return Ok(Vec::new());
    };

    let list = value.as_l().map_err(|_| RepositoryError::InvalidItem {
        message: format!("{} is not a list", name),
    })?;

    list.iter()
        .map(|element| {
            element
                .as_n()
                .ok()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| RepositoryError::InvalidItem {
                    message: format!("{} contains a non-numeric element", name),
                })
        })
        .collect()
}

/// Largest numeric `id` across scan pages
pub(crate) fn max_id(items: &[Item]) -> Option<u64> {
    items
        .iter()
        .filter_map(|item| optional_n::<u64>(item, "id"))
        .max()
}
