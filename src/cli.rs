use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SearchArgs {
    /// Number of nearest neighbors to return
    #[clap(short, default_value_t = crate::semantic::DEFAULT_K)]
    pub k: usize,

    /// Search the local embedding file instead of Typesense
    #[clap(long, default_value = "false")]
    pub offline: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean the raw product catalog into the canonical CSV
    Prepare {},

    /// Embed the canonical catalog into the embeddings file
    Embed {
        /// Compare the first products whose titles contain these two strings
        #[clap(long, num_args = 2, value_names = ["TITLE_A", "TITLE_B"])]
        compare: Option<Vec<String>>,
    },

    /// Create the Typesense collection if it does not exist
    Schema {},

    /// Assign ids and upsert the embeddings file into Typesense
    Import {},

    /// Run a single semantic search
    Search {
        /// What you are looking for
        query: String,

        #[command(flatten)]
        args: SearchArgs,
    },

    /// Interactive search prompt
    Shell {
        #[command(flatten)]
        args: SearchArgs,
    },

    /// Inspect embedding similarity
    Similar {
        /// Position of the product in the embeddings file
        #[clap(
            long,
            conflicts_with_all = ["compare", "matrix"],
            required_unless_present_any = ["compare", "matrix"]
        )]
        index: Option<usize>,

        /// Number of neighbors to show
        #[clap(long, default_value_t = 5)]
        top: usize,

        /// Compare the first products whose titles contain these two strings
        #[clap(long, num_args = 2, value_names = ["TITLE_A", "TITLE_B"])]
        compare: Option<Vec<String>>,

        /// Print the pairwise similarity matrix of the first N products
        #[clap(long, value_name = "N", conflicts_with = "compare")]
        matrix: Option<usize>,
    },
}
