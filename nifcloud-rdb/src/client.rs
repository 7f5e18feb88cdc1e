//! NIFCLOUD RDB query client.
//!
//! The RDB endpoint speaks a flat query API: every request is a signed GET
//! against `/` with the operation selected by the `Action` parameter, and
//! every response body is XML. Only the `NiftyGetMetricStatistics` action is
//! implemented here.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::credential::Credential;
use crate::error::{ApiError, Result};
use crate::sign;

const ACTION: &str = "NiftyGetMetricStatistics";
const SIGNATURE_VERSION: &str = "2";
const SIGNATURE_METHOD: &str = "HmacSHA256";

/// A name/value pair scoping a metric query, e.g. `DBInstanceIdentifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Parameters for a `NiftyGetMetricStatistics` call.
#[derive(Debug, Clone)]
pub struct NiftyGetMetricStatisticsInput {
    pub dimensions: Vec<Dimension>,
    pub metric_name: String,
    /// Start of the requested window, in the `YYYY-M-D HH:MM` form the API
    /// expects. Month and day are not zero padded.
    pub start_time: String,
}

/// One aggregated datapoint returned by the API.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub timestamp: String,
    pub sample_count: f64,
    pub sum: f64,
}

/// Decoded `NiftyGetMetricStatistics` response.
#[derive(Debug, Clone, Default)]
pub struct NiftyGetMetricStatisticsOutput {
    pub datapoints: Vec<Datapoint>,
    pub label: String,
}

/// The metric statistics operation, as a trait so collectors can be tested
/// against stub implementations.
#[async_trait]
pub trait MetricStatistics: Send + Sync {
    async fn nifty_get_metric_statistics(
        &self,
        input: &NiftyGetMetricStatisticsInput,
    ) -> Result<NiftyGetMetricStatisticsOutput>;
}

/// Signed HTTP client for one regional RDB endpoint.
#[derive(Debug, Clone)]
pub struct RdbClient {
    scheme: String,
    host: String,
    credential: Credential,
    http: reqwest::Client,
}

impl RdbClient {
    /// Builds a client for the regional endpoint
    /// `https://rdb.{region}.api.cloud.nifty.com/`.
    pub fn new(region: &str, credential: Credential) -> Self {
        Self::with_host(format!("rdb.{region}.api.cloud.nifty.com"), credential)
    }

    /// Builds a client against an explicit endpoint host instead of the
    /// region-derived one.
    pub fn with_host(host: impl Into<String>, credential: Credential) -> Self {
        Self {
            scheme: "https".to_string(),
            host: host.into(),
            credential,
            http: reqwest::Client::new(),
        }
    }

    fn query_params(
        &self,
        input: &NiftyGetMetricStatisticsInput,
        timestamp: &str,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("Action".to_string(), ACTION.to_string()),
            (
                "AccessKeyId".to_string(),
                self.credential.access_key_id.clone(),
            ),
            ("SignatureVersion".to_string(), SIGNATURE_VERSION.to_string()),
            ("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string()),
            ("Timestamp".to_string(), timestamp.to_string()),
            ("MetricName".to_string(), input.metric_name.clone()),
            ("StartTime".to_string(), input.start_time.clone()),
        ];
        // List parameters are flattened to Dimensions.member.N.*, 1-based.
        for (i, dimension) in input.dimensions.iter().enumerate() {
            params.push((
                format!("Dimensions.member.{}.Name", i + 1),
                dimension.name.clone(),
            ));
            params.push((
                format!("Dimensions.member.{}.Value", i + 1),
                dimension.value.clone(),
            ));
        }
        params
    }

    fn request_url(&self, input: &NiftyGetMetricStatisticsInput, timestamp: &str) -> String {
        let query = sign::canonical_query(&self.query_params(input, timestamp));
        let to_sign = sign::string_to_sign(&self.host, "/", &query);
        let signature = sign::signature(&self.credential.secret_access_key, &to_sign);
        format!(
            "{}://{}/?{}&Signature={}",
            self.scheme,
            self.host,
            query,
            sign::encode_component(&signature)
        )
    }
}

#[async_trait]
impl MetricStatistics for RdbClient {
    async fn nifty_get_metric_statistics(
        &self,
        input: &NiftyGetMetricStatisticsInput,
    ) -> Result<NiftyGetMetricStatisticsOutput> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let url = self.request_url(input, &timestamp);

        tracing::trace!(metric = %input.metric_name, host = %self.host, "Requesting metric statistics");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(decode_error(status.as_u16(), &body));
        }

        decode_output(&body)
    }
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse {
    #[serde(rename = "NiftyGetMetricStatisticsResult")]
    result: StatisticsResult,
}

#[derive(Debug, Default, Deserialize)]
struct StatisticsResult {
    #[serde(rename = "Datapoints", default)]
    datapoints: DatapointList,
    #[serde(rename = "Label", default)]
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct DatapointList {
    #[serde(rename = "member", default)]
    member: Vec<XmlDatapoint>,
}

#[derive(Debug, Deserialize)]
struct XmlDatapoint {
    #[serde(rename = "Timestamp", default)]
    timestamp: String,
    #[serde(rename = "SampleCount", default)]
    sample_count: f64,
    #[serde(rename = "Sum", default)]
    sum: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Errors")]
    errors: ErrorList,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorList {
    #[serde(rename = "Error", default)]
    error: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

fn decode_output(body: &str) -> Result<NiftyGetMetricStatisticsOutput> {
    let response: StatisticsResponse = quick_xml::de::from_str(body)?;
    Ok(NiftyGetMetricStatisticsOutput {
        label: response.result.label,
        datapoints: response
            .result
            .datapoints
            .member
            .into_iter()
            .map(|datapoint| Datapoint {
                timestamp: datapoint.timestamp,
                sample_count: datapoint.sample_count,
                sum: datapoint.sum,
            })
            .collect(),
    })
}

/// Maps a non-success response to [`ApiError::Api`]. Bodies that are not the
/// documented `ErrorResponse` XML keep the HTTP status as the code.
fn decode_error(status: u16, body: &str) -> ApiError {
    if let Ok(response) = quick_xml::de::from_str::<ErrorResponse>(body)
        && let Some(entry) = response.errors.error.into_iter().next()
    {
        return ApiError::Api {
            code: entry.code,
            message: entry.message,
        };
    }
    ApiError::Api {
        code: format!("Http{status}"),
        message: body.lines().next().unwrap_or("").chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> RdbClient {
        RdbClient::new("jp-east-1", Credential::new("AKID", "SECRET"))
    }

    fn test_input() -> NiftyGetMetricStatisticsInput {
        NiftyGetMetricStatisticsInput {
            dimensions: vec![Dimension {
                name: "DBInstanceIdentifier".to_string(),
                value: "db001".to_string(),
            }],
            metric_name: "CPUUtilization".to_string(),
            start_time: "2018-8-10 10:00".to_string(),
        }
    }

    #[test]
    fn test_request_url_is_sorted_and_signed() {
        let url = test_client().request_url(&test_input(), "2018-08-10T00:00:00Z");

        assert_eq!(
            url,
            "https://rdb.jp-east-1.api.cloud.nifty.com/?\
             AccessKeyId=AKID\
             &Action=NiftyGetMetricStatistics\
             &Dimensions.member.1.Name=DBInstanceIdentifier\
             &Dimensions.member.1.Value=db001\
             &MetricName=CPUUtilization\
             &SignatureMethod=HmacSHA256\
             &SignatureVersion=2\
             &StartTime=2018-8-10%2010%3A00\
             &Timestamp=2018-08-10T00%3A00%3A00Z\
             &Signature=jJ%2FF2ScGuFCc%2B16YYQXPyW6BtH73m4bmXo5MAUnssf0%3D"
        );
    }

    #[test]
    fn test_dimensions_expand_one_based() {
        let mut input = test_input();
        input.dimensions.push(Dimension {
            name: "Extra".to_string(),
            value: "x".to_string(),
        });
        let params = test_client().query_params(&input, "2018-08-10T00:00:00Z");

        let flat: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert!(flat.contains(&"Dimensions.member.1.Name=DBInstanceIdentifier".to_string()));
        assert!(flat.contains(&"Dimensions.member.1.Value=db001".to_string()));
        assert!(flat.contains(&"Dimensions.member.2.Name=Extra".to_string()));
        assert!(flat.contains(&"Dimensions.member.2.Value=x".to_string()));
    }

    #[test]
    fn test_with_host_overrides_endpoint() {
        let client = RdbClient::with_host("rdb.example.test", Credential::new("AKID", "SECRET"));
        let url = client.request_url(&test_input(), "2018-08-10T00:00:00Z");
        assert!(url.starts_with("https://rdb.example.test/?"));
    }

    #[test]
    fn test_decode_output_with_datapoints() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<NiftyGetMetricStatisticsResponse xmlns="https://rdb.api.cloud.nifty.com/doc/2013-05-15N2013-12-16/">
  <NiftyGetMetricStatisticsResult>
    <Datapoints>
      <member>
        <Timestamp>2018-08-10T09:59:00Z</Timestamp>
        <SampleCount>2.0</SampleCount>
        <Sum>42.5</Sum>
      </member>
      <member>
        <Timestamp>2018-08-10T10:00:00Z</Timestamp>
        <SampleCount>1.0</SampleCount>
        <Sum>40.0</Sum>
      </member>
    </Datapoints>
    <Label>CPUUtilization</Label>
  </NiftyGetMetricStatisticsResult>
</NiftyGetMetricStatisticsResponse>"#;

        let output = decode_output(body).unwrap();
        assert_eq!(output.label, "CPUUtilization");
        assert_eq!(output.datapoints.len(), 2);
        assert_eq!(output.datapoints[0].timestamp, "2018-08-10T09:59:00Z");
        assert_eq!(output.datapoints[0].sample_count, 2.0);
        assert_eq!(output.datapoints[0].sum, 42.5);
        assert_eq!(output.datapoints[1].sum, 40.0);
    }

    #[test]
    fn test_decode_output_empty_datapoints() {
        let body = r#"<NiftyGetMetricStatisticsResponse>
  <NiftyGetMetricStatisticsResult>
    <Datapoints/>
    <Label>FreeableMemory</Label>
  </NiftyGetMetricStatisticsResult>
</NiftyGetMetricStatisticsResponse>"#;

        let output = decode_output(body).unwrap();
        assert!(output.datapoints.is_empty());
        assert_eq!(output.label, "FreeableMemory");
    }

    #[test]
    fn test_decode_output_missing_datapoints_element() {
        let body = r#"<NiftyGetMetricStatisticsResponse>
  <NiftyGetMetricStatisticsResult>
    <Label>SwapUsage</Label>
  </NiftyGetMetricStatisticsResult>
</NiftyGetMetricStatisticsResponse>"#;

        let output = decode_output(body).unwrap();
        assert!(output.datapoints.is_empty());
    }

    #[test]
    fn test_decode_error_body() {
        let body = r#"<ErrorResponse>
  <Errors>
    <Error>
      <Type>Sender</Type>
      <Code>Client.InvalidParameterNotFound.DBInstance</Code>
      <Message>The request must contain the parameter: DBInstanceIdentifier</Message>
    </Error>
  </Errors>
  <RequestID>5ac48e84-7bb3-4f9b-ba9d-9a3fb0a2bb9f</RequestID>
</ErrorResponse>"#;

        match decode_error(400, body) {
            ApiError::Api { code, message } => {
                assert_eq!(code, "Client.InvalidParameterNotFound.DBInstance");
                assert!(message.contains("DBInstanceIdentifier"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_unrecognized_body() {
        match decode_error(503, "upstream unavailable") {
            ApiError::Api { code, message } => {
                assert_eq!(code, "Http503");
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
