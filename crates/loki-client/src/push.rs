// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Label names mapped to label values; identifies a stream.
pub type LabelSet = BTreeMap<String, String>;

/// Label every pushed stream starts from.
pub const BASE_LABEL: (&str, &str) = ("job", "varlog");

/// Body of `POST /loki/api/v1/push`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    pub streams: Vec<PushStream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushStream {
    pub stream: LabelSet,
    /// `[timestamp, line]` pairs, timestamps in decimal nanoseconds.
    pub values: Vec<[String; 2]>,
}

/// Formats `ts` as decimal nanoseconds since the Unix epoch. Instants before
/// the epoch come out negative.
pub fn format_timestamp(ts: SystemTime) -> String {
    match ts.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_nanos().to_string(),
        Err(err) => format!("-{}", err.duration().as_nanos()),
    }
}

/// Builds a push body holding exactly one stream with one line.
///
/// The stream's labels start from [`BASE_LABEL`] and each mapping in
/// `extra_labels` is laid over it in order, so later mappings win on key
/// collisions.
pub fn build_push_request(
    line: &str,
    timestamp: SystemTime,
    extra_labels: &[LabelSet],
) -> PushRequest {
    let mut stream = LabelSet::from([(BASE_LABEL.0.to_string(), BASE_LABEL.1.to_string())]);
    for labels in extra_labels {
        stream.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    PushRequest {
        streams: vec![PushStream {
            stream,
            values: vec![[format_timestamp(timestamp), line.to_string()]],
        }],
    }
}
