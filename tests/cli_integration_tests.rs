//! CLI integration tests for the ncd-canopy tool.
//!
//! These run the compiled binary against small record files and check the
//! emitted CSV lines and exit status.

use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ncd-canopy"))
}

fn write_records(dir: &Path, lines: &[&str]) -> Result<std::path::PathBuf> {
    let path = dir.join("records.csv");
    fs::write(&path, lines.join("\n") + "\n")?;
    Ok(path)
}

/// Two identical records and one unrelated record, far apart under NCD.
const CLUSTER_RECORDS: &[&str] = &[
    "1,ACGTTGCAAGCTTGCAGGCATGCAAGCTTGGCACTGGCCGTCGTTTTACAACGTCGTGACTGGG",
    "2,ACGTTGCAAGCTTGCAGGCATGCAAGCTTGGCACTGGCCGTCGTTTTACAACGTCGTGACTGGG",
    "3,The quick brown fox jumps over the lazy dog while singing a tune.",
];

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Parse `canopyId,memberId` lines into (canopy, member) pairs.
fn parse_membership(lines: &[String]) -> Vec<(u32, u32)> {
    lines
        .iter()
        .map(|l| {
            let (c, m) = l.split_once(',').unwrap();
            (c.parse().unwrap(), m.parse().unwrap())
        })
        .collect()
}

#[test]
fn test_cli_canopy_groups_identical_records() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), CLUSTER_RECORDS)?;

    let output = binary()
        .args(["-s", records.to_str().unwrap(), "--seed", "42"])
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let membership = parse_membership(&stdout_lines(&output));
    assert_eq!(membership.len(), 3, "each record listed exactly once");

    let canopy_of = |id: u32| membership.iter().find(|(_, m)| *m == id).unwrap().0;
    assert_eq!(canopy_of(1), canopy_of(2));
    assert_ne!(canopy_of(1), canopy_of(3));

    let mut canopy_ids: Vec<u32> = membership.iter().map(|(c, _)| *c).collect();
    canopy_ids.dedup();
    assert_eq!(canopy_ids, vec![0, 1], "canopy ids sequential from 0");
    Ok(())
}

#[test]
fn test_cli_same_seed_same_output() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(
        dir.path(),
        &[
            "1,ACGTACGTACGTACGTACGT",
            "2,ACGTACGTACGTACGTACGA",
            "3,TTTTGGGGCCCCAAAATTTT",
            "4,GATTACAGATTACAGATTACA",
            "5,zzzzzzzzzzzzzzzzzzzz",
        ],
    )?;

    let run = || -> Result<Vec<u8>> {
        let out = binary()
            .args(["-s", records.to_str().unwrap(), "--seed", "9", "-j", "2"])
            .output()?;
        assert!(out.status.success());
        Ok(out.stdout)
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

#[test]
fn test_cli_pairs_mode() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), CLUSTER_RECORDS)?;
    let pairs = dir.path().join("pairs.csv");
    fs::write(&pairs, "1,2\n1,3\n")?;

    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-p",
            pairs.to_str().unwrap(),
        ])
        .output()?;
    assert!(output.status.success());

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1,2,"));
    assert!(lines[1].starts_with("1,3,"));

    let d12: f64 = lines[0].rsplit(',').next().unwrap().parse()?;
    let d13: f64 = lines[1].rsplit(',').next().unwrap().parse()?;
    assert!(d12 < d13, "identical pair should be closer: {} vs {}", d12, d13);
    Ok(())
}

#[test]
fn test_cli_pairs_streamed_in_input_order() -> Result<()> {
    let dir = tempdir()?;
    let lines: Vec<String> = (0..30).map(|i| format!("{},SEQ{:03}", i, i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let records = write_records(dir.path(), &refs)?;

    // Enough pairs to span several batches and worker groups.
    let expected: Vec<(u32, u32)> = (0..10_000u32).map(|i| (i % 30, (i * 7 + 1) % 30)).collect();
    let pairs = dir.path().join("pairs.csv");
    let body: String = expected.iter().map(|(a, b)| format!("{},{}\n", a, b)).collect();
    fs::write(&pairs, body)?;
    let out_path = dir.path().join("distances.csv");

    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-p",
            pairs.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "-j",
            "2",
        ])
        .output()?;
    assert!(output.status.success());

    let text = fs::read_to_string(&out_path)?;
    let got: Vec<(u32, u32)> = text
        .lines()
        .map(|l| {
            let mut fields = l.split(',');
            let a = fields.next().unwrap().parse().unwrap();
            let b = fields.next().unwrap().parse().unwrap();
            (a, b)
        })
        .collect();
    assert_eq!(got, expected);
    Ok(())
}

#[test]
fn test_cli_unknown_pair_id_leaves_no_output_file() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), &["1,aaaa", "2,aaaa"])?;
    let pairs = dir.path().join("pairs.csv");
    fs::write(&pairs, "1,2\n2,77\n")?;
    let out_path = dir.path().join("distances.csv");

    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-p",
            pairs.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
        ])
        .output()?;
    assert!(!output.status.success());
    assert!(!out_path.exists());
    Ok(())
}

#[test]
fn test_cli_pairs_unknown_id_fails() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), &["1,aaaa", "2,aaaa"])?;
    let pairs = dir.path().join("pairs.csv");
    fs::write(&pairs, "1,99\n")?;

    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-p",
            pairs.to_str().unwrap(),
        ])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("99"));
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn test_cli_sample_two_gives_one_pair() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(
        dir.path(),
        &["1,aaaa", "2,bbbb", "3,cccc", "4,dddd", "5,eeee"],
    )?;

    let output = binary()
        .args(["-s", records.to_str().unwrap(), "--sample", "2", "--seed", "3"])
        .output()?;
    assert!(output.status.success());

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(fields.len(), 3);
    assert_ne!(fields[0], fields[1]);
    Ok(())
}

#[test]
fn test_cli_rejects_inverted_thresholds() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), &["1,aaaa"])?;

    let output = binary()
        .args(["-s", records.to_str().unwrap(), "--t1", "0.6", "--t2", "0.3"])
        .output()?;
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn test_cli_missing_sequence_file_fails() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("nope.csv");

    let output = binary().args(["-s", missing.to_str().unwrap()]).output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.csv"));
    Ok(())
}

#[test]
fn test_cli_malformed_record_fails() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), &["1,aaaa", "not-a-record"])?;

    let output = binary().args(["-s", records.to_str().unwrap()]).output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn test_cli_results_dir_and_gzip_output() -> Result<()> {
    let dir = tempdir()?;
    let records = write_records(dir.path(), CLUSTER_RECORDS)?;
    let results = dir.path().join("results");

    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-r",
            results.to_str().unwrap(),
            "--seed",
            "1",
        ])
        .output()?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let text = fs::read_to_string(results.join("canopies.csv"))?;
    assert_eq!(text.lines().count(), 3);

    let gz_path = dir.path().join("out").join("canopies.csv.gz");
    let output = binary()
        .args([
            "-s",
            records.to_str().unwrap(),
            "-o",
            gz_path.to_str().unwrap(),
            "--seed",
            "1",
        ])
        .output()?;
    assert!(output.status.success());
    let mut decoded = String::new();
    GzDecoder::new(fs::File::open(&gz_path)?).read_to_string(&mut decoded)?;
    assert_eq!(decoded, text);
    Ok(())
}

#[test]
fn test_cli_help_and_version() -> Result<()> {
    let help = binary().arg("--help").output()?;
    assert!(help.status.success());
    let text = String::from_utf8_lossy(&help.stdout);
    assert!(text.contains("--t1"));
    assert!(text.contains("--sample"));

    let version = binary().arg("--version").output()?;
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}
