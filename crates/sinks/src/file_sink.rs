// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local append-only file sink, for operators who want a filesystem copy
//! of everything pushed to Loki (or as the only sink in air-gapped setups).

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use logcap_core::{Batch, Sink, SinkError};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct FileSinkConfig {
    pub directory: PathBuf,
    pub filename_template: String,
    pub max_bytes: u64,
    pub max_age: ChronoDuration,
    pub gzip_rotated: bool,
}

struct OpenFile {
    path: PathBuf,
    opened_at: chrono::DateTime<Utc>,
    size: u64,
}

pub struct FileSink {
    config: FileSinkConfig,
    current: Mutex<Option<OpenFile>>,
}

impl FileSink {
    pub fn new(config: FileSinkConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    fn render_filename(&self, now: chrono::DateTime<Utc>) -> String {
        self.config
            .filename_template
            .replace("{date}", &now.format("%Y-%m-%d").to_string())
            .replace("{source_id}", "agent")
    }

    fn rotate(&self, current: OpenFile) -> std::io::Result<()> {
        if !self.config.gzip_rotated {
            return Ok(());
        }
        let gz_path = current.path.with_extension(
            current
                .path
                .extension()
                .map(|e| format!("{}.gz", e.to_string_lossy()))
                .unwrap_or_else(|| "gz".to_string()),
        );
        let data = fs::read(&current.path)?;
        let gz_file = File::create(&gz_path)?;
        let mut encoder = GzEncoder::new(gz_file, Compression::default());
        encoder.write_all(&data)?;
        encoder.finish()?;
        fs::remove_file(&current.path)?;
        Ok(())
    }

    fn needs_rotation(&self, open: &OpenFile, now: chrono::DateTime<Utc>, incoming_bytes: u64) -> bool {
        open.size + incoming_bytes > self.config.max_bytes
            || now - open.opened_at > self.config.max_age
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, batch: Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut payload = String::new();
        for record in &batch.records {
            payload.push_str(&serde_json::to_string(record).unwrap_or_default());
            payload.push('\n');
        }
        let incoming_bytes = payload.len() as u64;

        fs::create_dir_all(&self.config.directory)?;

        let mut current = self.current.lock();
        let needs_new = match current.as_ref() {
            Some(open) => self.needs_rotation(open, now, incoming_bytes),
            None => true,
        };

        if needs_new {
            if let Some(old) = current.take() {
                self.rotate(old)?;
            }
            let filename = self.render_filename(now);
            let path = self.config.directory.join(filename);
            *current = Some(OpenFile {
                path,
                opened_at: now,
                size: 0,
            });
        }

        let Some(open) = current.as_mut() else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&open.path)?;
        file.write_all(payload.as_bytes())?;
        file.sync_all()?;
        open.size += incoming_bytes;

        Ok(())
    }
}
