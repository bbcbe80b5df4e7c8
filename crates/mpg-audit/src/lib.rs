//! mpg-audit
//!
//! Append-only JSONL decision log with an optional SHA-256 hash chain.
//! Each promotion invocation appends one event; `mpg audit verify` walks the
//! chain and reports the first broken line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

/// Namespace for deterministic event ids.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d70_675f_6175_6469_745f_6576_656e_7400);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Appends events to one JSONL file.
///
/// Opening an existing log resumes its chain: the next event links to the
/// last line's `hash_self` and continues its sequence number.
#[derive(Debug)]
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }

        let (last_hash, seq) = match fs::read_to_string(&path) {
            Ok(content) => resume_point(&content)
                .with_context(|| format!("resume audit log {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, 0),
            Err(e) => {
                return Err(e).with_context(|| format!("read audit log {}", path.display()))
            }
        };
        debug!(path = %path.display(), seq, "audit log opened");

        Ok(Self {
            path,
            hash_chain,
            last_hash,
            seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of events in the log (the next event's `seq`).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn append(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;

        let mut ev = AuditEvent {
            event_id,
            run_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            ev.hash_self = Some(compute_event_hash(&ev)?);
        }

        let line = canonical_json(&ev)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        if self.hash_chain {
            self.last_hash = ev.hash_self.clone();
        }
        Ok(ev)
    }
}

fn resume_point(content: &str) -> Result<(Option<String>, u64)> {
    let mut count = 0u64;
    let mut last: Option<&str> = None;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        count += 1;
        last = Some(line);
    }
    let last_hash = match last {
        Some(line) => {
            let ev: AuditEvent =
                serde_json::from_str(line).context("parse last audit event failed")?;
            ev.hash_self
        }
        None => None,
    };
    Ok((last_hash, count))
}

/// Event id derived from chain position and payload, so re-running the same
/// append against the same log state yields the same id.
pub fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let material = format!(
        "{}|{}|{}",
        prev_hash.unwrap_or("-"),
        canonical_json(payload)?,
        seq
    );
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, material.as_bytes()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {}", path.display()))?;
    writeln!(f, "{line}").context("write audit line failed")
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit value failed")?;
    serde_json::to_string(&sort_keys(raw)).context("json stringify failed")
}

fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// SHA-256 over the canonical event with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut unsealed = ev.clone();
    unsealed.hash_self = None;
    let canonical = canonical_json(&unsealed)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// First line (1-based) where the chain does not hold.
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("read audit log {}", path.display()))?;
    Ok(verify_hash_chain_str(&content))
}

/// Unparseable lines are reported as breaks rather than errors.
pub fn verify_hash_chain_str(content: &str) -> VerifyResult {
    let mut prev_hash: Option<String> = None;
    let mut lines = 0usize;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = match serde_json::from_str(trimmed) {
            Ok(ev) => ev,
            Err(e) => {
                return VerifyResult::Broken {
                    line: line_no,
                    reason: format!("unparseable event: {e}"),
                }
            }
        };
        lines += 1;

        if ev.hash_prev != prev_hash {
            return VerifyResult::Broken {
                line: line_no,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            };
        }

        if let Some(claimed) = ev.hash_self.as_deref() {
            match compute_event_hash(&ev) {
                Ok(recomputed) if recomputed == claimed => {}
                Ok(recomputed) => {
                    return VerifyResult::Broken {
                        line: line_no,
                        reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                    }
                }
                Err(e) => {
                    return VerifyResult::Broken {
                        line: line_no,
                        reason: format!("hash recompute failed: {e}"),
                    }
                }
            }
        }

        prev_hash = ev.hash_self;
    }

    VerifyResult::Valid { lines }
}
