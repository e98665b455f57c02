// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed views of Loki query and label responses.
//!
//! A query answer is a `{"status", "data"}` envelope whose `data.result` has
//! one of three shapes, selected by the sibling `data.resultType` tag. The tag
//! is read first and the payload is then decoded straight into the matching
//! [`QueryData`] variant. Tags other than `streams`, `matrix` and `vector` are
//! rejected.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::push::LabelSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Streams,
    Matrix,
    Vector,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streams => "streams",
            Self::Matrix => "matrix",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of the query and query_range endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub status: String,
    pub data: QueryData,
}

/// A query answer whose `data` may be absent, as in the
/// `{"status":"error","errorType":..,"error":..}` bodies sent with non-2xx
/// statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

impl QueryEnvelope {
    /// Requires `data`, which every successful answer carries.
    pub(crate) fn into_response(self) -> Result<QueryResponse, serde_json::Error> {
        let data = self
            .data
            .ok_or_else(|| <serde_json::Error as de::Error>::missing_field("data"))?;
        Ok(QueryResponse {
            status: self.status,
            data,
        })
    }
}

/// The result payload, one variant per `resultType`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Streams(Vec<StreamValues>),
    Matrix(Vec<MatrixValues>),
    Vector(Vec<VectorValues>),
}

impl QueryData {
    pub fn result_type(&self) -> ResultType {
        match self {
            Self::Streams(_) => ResultType::Streams,
            Self::Matrix(_) => ResultType::Matrix,
            Self::Vector(_) => ResultType::Vector,
        }
    }

    /// Stream entries, empty unless the result type is `streams`.
    pub fn streams(&self) -> &[StreamValues] {
        match self {
            Self::Streams(streams) => streams,
            _ => &[],
        }
    }

    /// Matrix entries, empty unless the result type is `matrix`.
    pub fn matrix(&self) -> &[MatrixValues] {
        match self {
            Self::Matrix(matrix) => matrix,
            _ => &[],
        }
    }

    /// Vector entries, empty unless the result type is `vector`.
    pub fn vector(&self) -> &[VectorValues] {
        match self {
            Self::Vector(vector) => vector,
            _ => &[],
        }
    }
}

impl<'de> Deserialize<'de> for QueryData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "resultType", default)]
            result_type: String,
            #[serde(default)]
            result: Value,
        }

        let Tagged {
            result_type,
            result,
        } = Tagged::deserialize(deserializer)?;

        match result_type.as_str() {
            "streams" => decode_result(result).map(Self::Streams),
            "matrix" => decode_result(result).map(Self::Matrix),
            "vector" => decode_result(result).map(Self::Vector),
            other => Err(de::Error::custom(format!("unknown result type {other}"))),
        }
    }
}

/// A `null` or missing result decodes as no entries.
fn decode_result<T, E>(result: Value) -> Result<Vec<T>, E>
where
    T: for<'a> Deserialize<'a>,
    E: de::Error,
{
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(result).map_err(E::custom)
}

/// A log stream: its labels plus `[timestamp, line]` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamValues {
    #[serde(default)]
    pub stream: LabelSet,
    #[serde(default)]
    pub values: Vec<[String; 2]>,
}

/// A range-query series: labels plus `[timestamp, value]` samples as sent by
/// the server (timestamps are numbers, values are strings).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixValues {
    #[serde(default)]
    pub metric: LabelSet,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// An instant-query sample: labels plus a single timestamp and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorValues {
    pub metric: LabelSet,
    /// Decoded from the numeric (possibly fractional) seconds the server
    /// sends. Clients that only accept integer timestamps leave this at zero
    /// for such samples; this one does not. `UNIX_EPOCH` when the server's
    /// timestamp is not a non-negative number.
    pub time: SystemTime,
    /// Empty when the server's value is not a string.
    pub value: String,
}

impl<'de> Deserialize<'de> for VectorValues {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            metric: LabelSet,
            #[serde(default)]
            value: Vec<Value>,
        }

        let Raw { metric, value } = Raw::deserialize(deserializer)?;
        let [ts, sample] = <[Value; 2]>::try_from(value).map_err(|value| {
            de::Error::custom(format!("unexpected value length {}", value.len()))
        })?;

        let time = ts
            .as_f64()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map_or(UNIX_EPOCH, |since| UNIX_EPOCH + since);
        let value = sample.as_str().map(str::to_string).unwrap_or_default();

        Ok(Self {
            metric,
            time,
            value,
        })
    }
}

/// Answer of the labels and label values endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LabelResponse {
    #[serde(default)]
    pub data: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(body: Value) -> Result<QueryResponse, serde_json::Error> {
        serde_json::from_value(body)
    }

    #[test]
    fn decodes_streams_result() {
        let response = decode(json!({
            "status": "success",
            "data": {
                "resultType": "streams",
                "result": [
                    {"stream": {"job": "varlog"}, "values": [["1700000000000000000", "a"], ["1700000000000000001", "b"]]},
                    {"stream": {"job": "api"}, "values": [["1700000000000000002", "c"]]}
                ]
            }
        }))
        .expect("valid streams response");

        assert_eq!(response.status, "success");
        assert_eq!(response.data.result_type(), ResultType::Streams);
        let streams = response.data.streams();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].stream.get("job").map(String::as_str), Some("varlog"));
        assert_eq!(
            streams[0].values[1],
            ["1700000000000000001".to_string(), "b".to_string()]
        );
        assert!(response.data.matrix().is_empty());
        assert!(response.data.vector().is_empty());
    }

    #[test]
    fn decodes_matrix_result_with_mixed_sample_types() {
        let response = decode(json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {"metric": {"level": "error"}, "values": [[1700000000.5, "3"], [1700000060, "4"]]}
                ]
            }
        }))
        .expect("valid matrix response");

        assert_eq!(response.data.result_type(), ResultType::Matrix);
        let matrix = response.data.matrix();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[0].values[0], vec![json!(1700000000.5), json!("3")]);
        assert!(response.data.streams().is_empty());
        assert!(response.data.vector().is_empty());
    }

    #[test]
    fn decodes_vector_result() {
        let response = decode(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"job": "varlog"}, "value": [1700000000, "42"]},
                    {"metric": {}, "value": [1700000000.25, "7"]}
                ]
            }
        }))
        .expect("valid vector response");

        assert_eq!(response.data.result_type(), ResultType::Vector);
        let vector = response.data.vector();
        assert_eq!(vector.len(), 2);
        assert_eq!(vector[0].value, "42");
        assert_eq!(vector[0].time, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert_eq!(
            vector[1].time,
            UNIX_EPOCH + Duration::from_millis(1_700_000_000_250)
        );
        assert!(response.data.streams().is_empty());
        assert!(response.data.matrix().is_empty());
    }

    #[test]
    fn vector_with_unreadable_sample_keeps_zero_values() {
        let response = decode(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{"metric": {"job": "varlog"}, "value": ["not-a-time", 42]}]
            }
        }))
        .expect("unreadable sample fields are not an error");

        let sample = &response.data.vector()[0];
        assert_eq!(sample.time, UNIX_EPOCH);
        assert_eq!(sample.value, "");
        assert_eq!(sample.metric.get("job").map(String::as_str), Some("varlog"));
    }

    #[test]
    fn vector_value_must_have_two_elements() {
        for (value, len) in [(json!([1700000000]), 1), (json!([1, "2", 3]), 3), (json!([]), 0)] {
            let err = decode(json!({
                "status": "success",
                "data": {"resultType": "vector", "result": [{"metric": {}, "value": value}]}
            }))
            .expect_err("wrong value length must fail");
            assert!(
                err.to_string()
                    .contains(&format!("unexpected value length {len}")),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn unknown_result_type_is_rejected() {
        let err = decode(json!({
            "status": "success",
            "data": {"resultType": "bogus", "result": []}
        }))
        .expect_err("unknown result type must fail");
        assert!(err.to_string().contains("unknown result type bogus"));
    }

    #[test]
    fn missing_result_type_is_rejected() {
        let err = decode(json!({"status": "success", "data": {"result": []}}))
            .expect_err("a missing tag is not a known result type");
        assert!(err.to_string().contains("unknown result type"));
    }

    #[test]
    fn result_may_come_before_the_tag() {
        let response: QueryResponse = serde_json::from_str(
            r#"{"data":{"result":[{"stream":{"a":"b"},"values":[]}],"resultType":"streams","stats":{}},"status":"success"}"#,
        )
        .expect("field order does not matter");
        assert_eq!(response.data.streams().len(), 1);
    }

    #[test]
    fn null_result_is_empty() {
        let response = decode(json!({
            "status": "success",
            "data": {"resultType": "matrix", "result": null}
        }))
        .expect("null result decodes");
        assert_eq!(response.data.result_type(), ResultType::Matrix);
        assert!(response.data.matrix().is_empty());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let result = decode(json!({
            "status": "success",
            "data": {"resultType": "streams", "result": [{"stream": "nope"}]}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn envelope_without_data_decodes_but_is_not_a_response() {
        let envelope: QueryEnvelope = serde_json::from_value(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at line 1"
        }))
        .expect("error envelope decodes");
        assert_eq!(envelope.status, "error");

        let err = envelope.into_response().expect_err("data is required");
        assert!(err.to_string().contains("missing field `data`"));
    }

    #[test]
    fn decodes_label_response() {
        let labels: LabelResponse =
            serde_json::from_value(json!({"status": "success", "data": ["a", "b"]}))
                .expect("valid label response");
        assert_eq!(labels.data, vec!["a", "b"]);
    }

    #[test]
    fn result_type_display() {
        assert_eq!(ResultType::Streams.to_string(), "streams");
        assert_eq!(ResultType::Matrix.to_string(), "matrix");
        assert_eq!(ResultType::Vector.to_string(), "vector");
    }
}
