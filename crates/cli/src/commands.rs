use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync pass and print its summary
    Sync {
        #[arg(long, help = "Run every stage except writing to the sheet")]
        dry_run: bool,

        #[arg(
            long,
            help = "If specified, writes the JSON run summary to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Run sync passes on a fixed interval until interrupted
    Watch {
        #[arg(long, help = "Seconds to wait between passes", default_value_t = 900)]
        every: u64,

        #[arg(long, help = "Run every stage except writing to the sheet")]
        dry_run: bool,
    },
    /// Show recent runs from the local history
    History {
        #[arg(long, help = "Number of runs to show", default_value_t = 10)]
        limit: usize,

        #[arg(long, help = "If set, prints the runs as JSON instead of a table")]
        json: bool,
    },
    /// Fetch the first page of the current window and report what came back
    CheckSource,
}
