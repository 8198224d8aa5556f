// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable transform hook applied to every record before batching.
//!
//! A stage can mutate a record (e.g. redact a field, add a derived label)
//! or drop it by returning `None`. Stages run in registration order.

use logcap_core::Record;

pub trait ProcessingStage: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, record: Record) -> Option<Record>;
}

pub(crate) fn apply_stages(stages: &[Box<dyn ProcessingStage>], mut record: Record) -> Option<Record> {
    for stage in stages {
        record = stage.process(record)?;
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logcap_core::{Labels, SourceId, SourceType, StreamKind, TraceId};

    struct UppercaseStage;
    impl ProcessingStage for UppercaseStage {
        fn name(&self) -> &str {
            "uppercase"
        }
        fn process(&self, mut record: Record) -> Option<Record> {
            record.message = record.message.to_uppercase();
            Some(record)
        }
    }

    struct DropEverythingStage;
    impl ProcessingStage for DropEverythingStage {
        fn name(&self) -> &str {
            "drop"
        }
        fn process(&self, _record: Record) -> Option<Record> {
            None
        }
    }

    fn record() -> Record {
        Record::new(
            TraceId::new("t"),
            chrono::Utc::now(),
            SourceType::File,
            SourceId::new("/var/log/app.log"),
            "hello",
            Labels::new(),
            StreamKind::Unknown,
        )
    }

    #[test]
    fn stages_run_in_order() {
        let stages: Vec<Box<dyn ProcessingStage>> = vec![Box::new(UppercaseStage)];
        let out = apply_stages(&stages, record()).unwrap();
        assert_eq!(out.message, "HELLO");
    }

    #[test]
    fn a_dropping_stage_short_circuits() {
        let stages: Vec<Box<dyn ProcessingStage>> =
            vec![Box::new(DropEverythingStage), Box::new(UppercaseStage)];
        assert!(apply_stages(&stages, record()).is_none());
    }
}
