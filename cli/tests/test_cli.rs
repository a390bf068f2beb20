use std::io::{BufReader, Cursor};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::predicate;

use kcontain::serialization::{read_binary_store, Sketch};

fn stdout_json(cmd: &mut Command) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let output = Cursor::new(cmd.output()?.stdout);
    Ok(serde_json::from_reader(output)?)
}

#[test]
fn file_doesnt_exist() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("sketch").arg("test/file/doesnt/exist");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));

    Ok(())
}

#[test]
fn kcontain_sketch() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("sketch")
        .args(&["-k", "3"])
        .args(&["--n-hashes", "10"])
        .arg("-O")
        .arg("tests/data/refA.fa")
        .arg("tests/data/refB.fa");
    cmd.assert().success();

    let sketch = stdout_json(&mut cmd)?;
    assert_eq!(sketch["kmer"], 3);
    assert_eq!(sketch["alphabet"], "ACGT");
    assert_eq!(sketch["sketchSize"], 10);
    assert_eq!(sketch["hashSeed"], 0);
    assert_eq!(sketch["canonical"], false);
    assert_eq!(sketch["sketches"][0]["name"], "tests/data/refA.fa");
    assert_eq!(sketch["sketches"][0]["kmers"], serde_json::json!(["AAA"]));
    assert_eq!(sketch["sketches"][0]["counts"], serde_json::json!([2]));
    assert_eq!(sketch["sketches"][1]["kmers"], serde_json::json!(["GGG"]));

    Ok(())
}

#[test]
fn kcontain_sketch_bin_then_count() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out_prefix = dir.path().join("refs");

    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("sketch")
        .args(&["-k", "3"])
        .arg("-b")
        .arg("-o")
        .arg(&out_prefix)
        .arg("tests/data/refA.fa")
        .arg("tests/data/refB.fa");
    cmd.assert().success();

    let store_path = dir.path().join("refs.bsk");
    let mut buf_reader = BufReader::new(std::fs::File::open(&store_path)?);
    let sketches: Vec<Sketch> = read_binary_store(&mut buf_reader)?;
    assert_eq!(sketches.len(), 2);
    assert_eq!(sketches[0].sketch_params.k(), 3);

    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count")
        .arg(&store_path)
        .arg("tests/data/reads.fq")
        .args(&["--threads", "2"]);
    cmd.assert().success();

    let report = stdout_json(&mut cmd)?;
    assert_eq!(report["reads"], 3);
    assert_eq!(report["skippedReads"], 0);
    assert_eq!(report["kmerWindows"], 7);
    assert_eq!(report["counts"][0]["reference"], "tests/data/refA.fa");
    assert_eq!(report["counts"][0]["hits"], 4);
    assert_eq!(report["counts"][1]["reference"], "tests/data/refB.fa");
    assert_eq!(report["counts"][1]["hits"], 1);

    Ok(())
}

#[test]
fn kcontain_count_strategies() -> Result<(), Box<dyn std::error::Error>> {
    for strategy in &["partial", "shared"] {
        let mut cmd = Command::cargo_bin("kcontain")?;
        cmd.arg("count")
            .arg("tests/data/refs.sk")
            .arg("tests/data/scenario.fq")
            .args(&["--strategy", *strategy])
            .args(&["--batch-size", "1"]);
        cmd.assert().success();

        let report = stdout_json(&mut cmd)?;
        assert_eq!(report["reads"], 2);
        assert_eq!(report["kmerWindows"], 7);
        assert_eq!(report["counts"][0]["reference"], "A");
        assert_eq!(report["counts"][0]["hits"], 2);
        assert_eq!(report["counts"][0]["sketchSize"], 2);
        assert_eq!(report["counts"][1]["reference"], "B");
        assert_eq!(report["counts"][1]["hits"], 2);
    }
    Ok(())
}

#[test]
fn kcontain_count_rejects_stores_without_kmers() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count")
        .arg("tests/data/nokmers.sk")
        .arg("tests/data/scenario.fq");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no stored kmers"));
    Ok(())
}

#[test]
fn kcontain_count_missing_store() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count")
        .arg("tests/data/missing.sk")
        .arg("tests/data/scenario.fq");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("sketch store not found"));
    Ok(())
}

#[test]
fn kcontain_info() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("info")
        .arg("tests/data/refs.sk")
        .arg("tests/data/nokmers.sk");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("A (from 6bp)"))
        .stdout(predicate::str::contains("Kmer length: 3"))
        .stdout(predicate::str::contains("Kmers retained: no"));
    Ok(())
}

#[test]
fn kcontain_count_empty_reads() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count")
        .arg("tests/data/refs.sk")
        .arg("tests/data/empty.fq")
        .arg("tests/data/scenario.fq");
    cmd.assert().success();

    let report = stdout_json(&mut cmd)?;
    assert_eq!(report["reads"], 2);
    assert_eq!(report["counts"][0]["hits"], 2);
    assert_eq!(report["counts"][1]["hits"], 2);
    Ok(())
}

#[test]
fn kcontain_count_corrupt_binary_store() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("corrupt.bsk");
    std::fs::write(&store_path, b"not a sketch store at all")?;

    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count").arg(&store_path).arg("tests/data/scenario.fq");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Not a kcontain binary sketch store"));
    Ok(())
}

#[test]
fn kcontain_count_has_no_stdout_flag() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("kcontain")?;
    cmd.arg("count")
        .arg("-O")
        .arg("tests/data/refs.sk")
        .arg("tests/data/scenario.fq");
    cmd.assert().failure();
    Ok(())
}
