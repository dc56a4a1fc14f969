#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

use das2stream::{Codec, FieldSpec, PacketSchema, StreamComment, StreamSchema, StreamWriter};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "d2scli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn sample_stream() -> Vec<u8> {
    let schema = PacketSchema::new(vec![
        FieldSpec::x(Codec::Ascii { width: 10 }, "s"),
        FieldSpec::y(Codec::Ascii { width: 10 }, "V").with_name("amp"),
    ])
    .expect("schema should validate");

    let mut writer = StreamWriter::new(Vec::new());
    writer
        .write_stream_schema(&StreamSchema::new().with_version("2.2"))
        .expect("stream header");
    let id = writer.write_packet_schema(&schema).expect("packet header");
    writer.write_packet(id, &[1.0, 0.5]).expect("packet");
    writer.write_packet(id, &[2.0, 1.5]).expect("packet");
    writer
        .write_comment(&StreamComment::new("taskProgress", "100"))
        .expect("comment");
    writer.close().expect("close")
}

fn das2stream(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_das2stream"))
        .arg("--log-level")
        .arg("off")
        .args(args)
        .output()
        .expect("das2stream should run")
}

#[test]
fn dump_prints_one_json_line_per_event() {
    let dir = unique_temp_dir("dump");
    let path = dir.join("sample.d2s");
    std::fs::write(&path, sample_stream()).expect("write sample");

    let output = das2stream(&["--format", "json", "dump", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    let names: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().expect("event tag"))
        .collect();
    assert_eq!(
        names,
        vec!["stream_schema", "packet_schema", "data", "data", "comment", "closed"]
    );
    assert_eq!(events[3]["x"], 2.0);
    assert_eq!(events[4]["value"], "100");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn dump_count_stops_early() {
    let dir = unique_temp_dir("count");
    let path = dir.join("sample.d2s");
    std::fs::write(&path, sample_stream()).expect("write sample");

    let output = das2stream(&[
        "--format",
        "pretty",
        "dump",
        path.to_str().expect("utf-8 path"),
        "--count",
        "1",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| l.starts_with("data")).count(), 1);
    assert!(!stdout.contains("closed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stats_reports_totals() {
    let dir = unique_temp_dir("stats");
    let path = dir.join("sample.d2s");
    std::fs::write(&path, sample_stream()).expect("write sample");

    let output = das2stream(&["--format", "json", "stats", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success());
    let stats: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stats output is JSON");
    assert_eq!(stats["packets"], 2);
    assert_eq!(stats["comments"], 1);
    assert_eq!(stats["compression"], "none");
    assert_eq!(stats["ids"][0]["packet_bytes"], 20);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn recode_to_deflate_and_back() {
    let dir = unique_temp_dir("recode");
    let plain = dir.join("plain.d2s");
    let packed = dir.join("packed.d2s");
    let unpacked = dir.join("unpacked.d2s");
    std::fs::write(&plain, sample_stream()).expect("write sample");

    let to_str = |p: &PathBuf| p.to_str().expect("utf-8 path").to_string();
    let output = das2stream(&[
        "recode",
        &to_str(&plain),
        &to_str(&packed),
        "--compression",
        "deflate",
    ]);
    assert!(output.status.success());
    let output = das2stream(&[
        "recode",
        &to_str(&packed),
        &to_str(&unpacked),
        "--compression",
        "none",
    ]);
    assert!(output.status.success());

    let original = std::fs::read(&plain).expect("read plain");
    let packed_bytes = std::fs::read(&packed).expect("read packed");
    assert_ne!(packed_bytes, original);
    assert_eq!(std::fs::read(&unpacked).expect("read unpacked"), original);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn html_input_fails_with_data_invalid() {
    let dir = unique_temp_dir("html");
    let path = dir.join("error.html");
    std::fs::write(&path, "<html><body>502 Bad Gateway</body></html>").expect("write html");

    let output = das2stream(&["--format", "json", "dump", path.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("HTML"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_returns_2() {
    let output = das2stream(&["dump", "/nonexistent/das2stream/input.d2s"]);
    assert_eq!(output.status.code(), Some(2));
}
