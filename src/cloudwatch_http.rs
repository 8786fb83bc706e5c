use crate::cloudwatch::{InputLogEvent, LogIngestionClient, LogStreamDescriptor, PutLogEventsOutput};
use crate::error::BoxError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// [`LogIngestionClient`] speaking the CloudWatch Logs JSON 1.1 protocol
/// over HTTP.
///
/// Requests are not signed. Point `endpoint` at something that takes care
/// of authentication (a SigV4 signing proxy, a VPC endpoint behind one, or a
/// local emulator).
#[derive(Clone)]
pub struct HttpLogsClient {
    client: Client,
    endpoint: String,
}

impl HttpLogsClient {
    /// **Parameters**
    /// - `endpoint`: base URL, e.g. `http://127.0.0.1:4566`.
    /// - `timeout`: per-request timeout applied by reqwest.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BoxError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpLogsClient {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn call<Req, Resp>(&self, action: &str, body: &Req) -> Result<Resp, BoxError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(resp.json::<Resp>().await?)
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("CloudWatch Logs {} failed with status {}: {}", action, status, text).into())
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [InputLogEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    #[serde(default)]
    next_sequence_token: Option<String>,
    #[serde(default)]
    rejected_log_events_info: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    log_stream_name: String,
    #[serde(default)]
    upload_sequence_token: Option<String>,
}

#[async_trait]
impl LogIngestionClient for HttpLogsClient {
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[InputLogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutLogEventsOutput, BoxError> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: events,
            sequence_token,
        };
        let response: PutLogEventsResponse = self.call("PutLogEvents", &request).await?;

        if let Some(rejected) = &response.rejected_log_events_info {
            tracing::debug!(%rejected, "cloudwatch rejected part of a batch");
        }

        Ok(PutLogEventsOutput {
            next_sequence_token: response.next_sequence_token,
        })
    }

    /// Follows `nextToken` until every matching stream has been listed.
    async fn describe_log_streams(
        &self,
        group: &str,
        stream_name_prefix: &str,
    ) -> Result<Vec<LogStreamDescriptor>, BoxError> {
        let mut descriptors = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = DescribeLogStreamsRequest {
                log_group_name: group,
                log_stream_name_prefix: stream_name_prefix,
                next_token: next_token.clone(),
            };
            let page: DescribeLogStreamsResponse = self.call("DescribeLogStreams", &request).await?;

            descriptors.extend(page.log_streams.into_iter().map(|s| LogStreamDescriptor {
                name: s.log_stream_name,
                upload_sequence_token: s.upload_sequence_token,
            }));

            match page.next_token {
                Some(token) if next_token.as_deref() != Some(token.as_str()) => next_token = Some(token),
                _ => break,
            }
        }

        Ok(descriptors)
    }
}
