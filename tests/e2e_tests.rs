//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every step through a sandboxed store manager
//! 3. Writes the journal as CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path purchases and deferred purchases
//! - Duplicate deliveries
//! - Failures, cancellations and the cancel fallback
//! - Restores and the restore fallback
//! - Verification approve/reject flows
//! - Orphaned transactions, finished or kept
//! - Malformed rows

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use storekit_manager::cli::CliArgs;
    use storekit_manager::replay::replay_file;
    use storekit_manager::StoreError;
    use tempfile::NamedTempFile;

    /// Replay tests/fixtures/{fixture_name}/input.csv with the given flags and
    /// compare the journal with expected.csv
    fn run_test_fixture(fixture_name: &str, flags: &[&str]) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut argv = vec!["storekit-replay"];
        argv.extend_from_slice(flags);
        argv.push(&input_path);
        let args = CliArgs::try_parse_from(argv).expect("fixture flags must parse");

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        replay_file(
            &args.input_file,
            args.to_store_config(),
            args.to_replay_options(),
            &mut temp_output,
        )
        .unwrap_or_else(|e| panic!("Failed to replay queue: {}", e));

        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (flags: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, flags, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path", &[])]
    #[case("deferred_then_purchased", &[])]
    #[case("duplicate_deliveries", &[])]
    #[case("failures_and_cancellations", &[])]
    #[case("cancel_fallback", &["--no-cancel-channel"])]
    #[case("restores", &[])]
    #[case("restore_fallback", &["--no-restore-channel"])]
    #[case("verification", &["--verify"])]
    #[case("orphans", &[])]
    #[case("orphans_kept", &["--keep-orphans"])]
    #[case("malformed_data", &[])]
    fn test_fixtures(#[case] fixture: &str, #[case] flags: &[&str]) {
        run_test_fixture(fixture, flags);
    }

    #[test]
    fn test_missing_input_file() {
        let args = CliArgs::try_parse_from(["storekit-replay", "tests/fixtures/missing.csv"])
            .unwrap();
        let mut output = Vec::new();

        let result = replay_file(
            &args.input_file,
            args.to_store_config(),
            args.to_replay_options(),
            &mut output,
        );

        assert!(matches!(result, Err(StoreError::FileNotFound { .. })));
        assert!(output.is_empty());
    }
}
