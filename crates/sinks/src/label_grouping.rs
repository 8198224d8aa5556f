// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group a batch's records into Loki streams: one stream per distinct label
//! set, values sorted ascending by timestamp (spec §4.5).

use logcap_core::{Labels, Record};
use std::collections::BTreeMap;

pub fn group_into_streams(records: Vec<Record>) -> Vec<(Labels, Vec<Record>)> {
    let mut grouped: BTreeMap<Labels, Vec<Record>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.labels.clone()).or_default().push(record);
    }
    for records in grouped.values_mut() {
        records.sort_by_key(|r| r.timestamp);
    }
    grouped.into_iter().collect()
}
