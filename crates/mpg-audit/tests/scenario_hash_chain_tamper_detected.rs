//! Decision log hash chain.
//!
//! GREEN when:
//! - A chained log written across two writer sessions verifies as one chain.
//! - Editing one payload in place breaks verification at that line.
//! - Deleting a middle line breaks verification at the line after the gap.

use mpg_audit::{verify_hash_chain, AuditWriter, VerifyResult};
use serde_json::json;
use uuid::Uuid;

fn write_events(path: &std::path::Path, n: usize) {
    let run_id = Uuid::new_v4();
    let mut w = AuditWriter::open(path, true).unwrap();
    for i in 0..n {
        w.append(
            run_id,
            "promotion",
            "decision",
            json!({ "candidate_version": (i + 1).to_string(), "outcome": "promote" }),
        )
        .unwrap();
    }
}

#[test]
fn chain_resumes_across_writer_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("promotion_audit.jsonl");

    write_events(&path, 2);
    let w = AuditWriter::open(&path, true).unwrap();
    assert_eq!(w.seq(), 2);
    assert!(w.last_hash().is_some());
    drop(w);
    write_events(&path, 3);

    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 5 });
}

#[test]
fn edited_payload_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("promotion_audit.jsonl");
    write_events(&path, 4);

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    lines[2] = lines[2].replace("\"promote\"", "\"reject\"");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 3);
            assert!(reason.contains("hash_self"), "{reason}");
        }
        other => panic!("expected Broken, got {other:?}"),
    }
}

#[test]
fn removed_line_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("promotion_audit.jsonl");
    write_events(&path, 4);

    let content = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = content
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, l)| l)
        .collect();
    std::fs::write(&path, kept.join("\n") + "\n").unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 2);
            assert!(reason.contains("hash_prev"), "{reason}");
        }
        other => panic!("expected Broken, got {other:?}"),
    }
}

#[test]
fn unchained_log_verifies_trivially() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.jsonl");
    let mut w = AuditWriter::open(&path, false).unwrap();
    let ev = w
        .append(Uuid::new_v4(), "promotion", "decision", json!({ "x": 1 }))
        .unwrap();
    assert!(ev.hash_self.is_none());
    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 1 });
}
