use crate::config::StoreConfig;
use crate::replay::ReplayOptions;
use clap::Parser;
use std::path::PathBuf;

/// Replay a recorded transaction queue through the store manager
#[derive(Parser, Debug)]
#[command(name = "storekit-replay")]
#[command(about = "Replay recorded transaction-queue deliveries and print the resulting journal", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing queue records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Declare the verification channel on the replay delegate
    #[arg(
        long = "verify",
        help = "Hold purchased and restored transactions until an approve/reject row"
    )]
    pub verify: bool,

    /// Leave the restore channel undeclared
    #[arg(
        long = "no-restore-channel",
        help = "Route restored transactions to the success channel"
    )]
    pub no_restore_channel: bool,

    /// Leave the cancel channel undeclared
    #[arg(
        long = "no-cancel-channel",
        help = "Route user cancellations to the failure channel"
    )]
    pub no_cancel_channel: bool,

    /// Leave orphaned purchased/restored transactions unfinished
    #[arg(
        long = "keep-orphans",
        help = "Do not finish purchased or restored transactions nobody is waiting for"
    )]
    pub keep_orphans: bool,
}

impl CliArgs {
    /// Create a StoreConfig from CLI arguments
    ///
    /// Replay never fetches products, so only the orphan policy is taken from
    /// the arguments; everything else keeps its default.
    pub fn to_store_config(&self) -> StoreConfig {
        let default = StoreConfig::default();
        StoreConfig::new(
            default.cache_fetched_products,
            !self.keep_orphans,
            default.max_concurrent_updates,
        )
    }

    /// Channels the replay delegate declares
    pub fn to_replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            verify: self.verify,
            restore_channel: !self.no_restore_channel,
            cancel_channel: !self.no_cancel_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::no_flags(&["program", "queue.csv"], false, false, false, false)]
    #[case::verify(&["program", "--verify", "queue.csv"], true, false, false, false)]
    #[case::no_restore(&["program", "--no-restore-channel", "queue.csv"], false, true, false, false)]
    #[case::no_cancel(&["program", "--no-cancel-channel", "queue.csv"], false, false, true, false)]
    #[case::keep_orphans(&["program", "--keep-orphans", "queue.csv"], false, false, false, true)]
    #[case::all_flags(
        &["program", "--verify", "--no-restore-channel", "--no-cancel-channel", "--keep-orphans", "queue.csv"],
        true,
        true,
        true,
        true
    )]
    fn test_flag_parsing(
        #[case] args: &[&str],
        #[case] verify: bool,
        #[case] no_restore: bool,
        #[case] no_cancel: bool,
        #[case] keep_orphans: bool,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.input_file, PathBuf::from("queue.csv"));
        assert_eq!(parsed.verify, verify);
        assert_eq!(parsed.no_restore_channel, no_restore);
        assert_eq!(parsed.no_cancel_channel, no_cancel);
        assert_eq!(parsed.keep_orphans, keep_orphans);
    }

    #[rstest]
    #[case::default(&["program", "queue.csv"], true)]
    #[case::keep_orphans(&["program", "--keep-orphans", "queue.csv"], false)]
    fn test_store_config_conversion(#[case] args: &[&str], #[case] finish_orphans: bool) {
        let config = CliArgs::try_parse_from(args).unwrap().to_store_config();

        assert_eq!(config.finish_orphaned_transactions, finish_orphans);
        assert!(config.cache_fetched_products);
        assert_eq!(
            config.max_concurrent_updates,
            StoreConfig::default().max_concurrent_updates
        );
    }

    #[test]
    fn test_replay_options_conversion() {
        let defaults = CliArgs::try_parse_from(["program", "queue.csv"])
            .unwrap()
            .to_replay_options();
        assert_eq!(defaults, ReplayOptions::default());

        let options = CliArgs::try_parse_from([
            "program",
            "--verify",
            "--no-restore-channel",
            "--no-cancel-channel",
            "queue.csv",
        ])
        .unwrap()
        .to_replay_options();
        assert_eq!(
            options,
            ReplayOptions {
                verify: true,
                restore_channel: false,
                cancel_channel: false,
            }
        );
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::unknown_flag(&["program", "--strategy", "sync", "queue.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
