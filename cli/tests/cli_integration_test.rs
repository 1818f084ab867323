use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn tmp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("tonelink-cli-tests");
    fs::create_dir_all(&dir).expect("Failed to create tmp dir");
    dir.join(name)
}

fn create_test_file(name: &str, content: &[u8]) -> PathBuf {
    let path = tmp_path(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn run_tonelink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tonelink"))
        .args(args)
        .output()
        .expect("Failed to run tonelink")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_encode_then_decode() {
    let content = b"Hello over the air!";
    let input = create_test_file("round_trip_input.bin", content);
    let encoded = tmp_path("round_trip.wav");
    let decoded = tmp_path("round_trip_output.bin");

    let output = run_tonelink(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--ecc",
        "h",
        "--crc",
    ]);
    assert!(output.status.success(), "encode failed: {:?}", output);
    assert!(stdout(&output).contains("Encoded"));

    let output = run_tonelink(&["decode", encoded.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(output.status.success(), "decode failed: {:?}", output);
    assert!(stdout(&output).contains("Decoded 19 bytes"));

    assert_eq!(fs::read(&decoded).unwrap(), content);
}

#[test]
fn test_encoded_file_size() {
    let input = create_test_file("size_input.bin", &[0xA5; 16]);
    let encoded = tmp_path("size.wav");

    let output = run_tonelink(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--ecc",
        "L",
    ]);
    assert!(output.status.success(), "encode failed: {:?}", output);

    // 16 bytes at L is one block of 22 bytes: 44 symbols, 2 header words and 22 payload words
    let message = 2 * 5292 + 24 * 2646;
    let padding = 2 * 11025;
    let data_bytes = 2 * (message + padding) as u64;
    let file_size = fs::metadata(&encoded).unwrap().len();
    // RIFF header on top of the samples
    assert!(file_size >= data_bytes + 44, "file too small: {}", file_size);
    assert!(file_size <= data_bytes + 128, "file too large: {}", file_size);
}

#[test]
fn test_decode_at_48k() {
    let content = b"48k";
    let input = create_test_file("rate_input.bin", content);
    let encoded = tmp_path("rate.wav");
    let decoded = tmp_path("rate_output.bin");

    let output = run_tonelink(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--sample-rate",
        "48000",
    ]);
    assert!(output.status.success(), "encode failed: {:?}", output);

    let output = run_tonelink(&[
        "decode",
        encoded.to_str().unwrap(),
        decoded.to_str().unwrap(),
        "--chunk",
        "333",
    ]);
    assert!(output.status.success(), "decode failed: {:?}", output);
    assert!(stdout(&output).contains("48000 Hz"));
    assert_eq!(fs::read(&decoded).unwrap(), content);
}

#[test]
fn test_decode_silence_fails() {
    let path = tmp_path("silence.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..44100 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let decoded = tmp_path("silence_output.bin");
    let _ = fs::remove_file(&decoded);
    let output = run_tonelink(&["decode", path.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no message found"));
    assert!(!decoded.exists());
}

#[test]
fn test_rejects_oversized_input() {
    let input = create_test_file("oversized_input.bin", &[0u8; 300]);
    let encoded = tmp_path("oversized.wav");

    let output = run_tonelink(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Payload too large"));
}

#[test]
fn test_rejects_unknown_ecc_level() {
    let input = create_test_file("bad_level_input.bin", b"x");
    let encoded = tmp_path("bad_level.wav");

    let output = run_tonelink(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--ecc",
        "z",
    ]);
    assert!(!output.status.success());
}
