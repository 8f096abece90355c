use clap::Parser as ClapParser;
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "TF-IDF search over an offline-built biomedical paper index", long_about = None)]
pub struct Args {
    /// Free-text query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Directory holding the model bundle (vocab.bin, tfidf.bin,
    /// classifier.bin, shards/)
    #[arg(short = 'i', long = "index-dir", default_value = "index")]
    pub index_dir: PathBuf,

    /// Restrict the search to these categories (repeatable); without it the
    /// query classifier picks the categories
    #[arg(short = 'c', long = "category")]
    pub categories: Vec<String>,

    /// Search the full "all" sub-shard set, ignoring any --category
    #[arg(long = "deep")]
    pub deep: bool,

    /// Per-shard result budget
    #[arg(long = "top-k", default_value_t = 20)]
    pub top_k: usize,

    /// Maximum number of merged results to return
    #[arg(long = "max-results")]
    pub max_results: Option<usize>,

    /// Follow-up filter: keep only these journals (repeatable)
    #[arg(long = "journal")]
    pub journals: Vec<String>,

    /// Follow-up filter: publication year range, e.g. --years 2019 2023
    #[arg(long = "years", num_args = 2, value_names = ["LO", "HI"])]
    pub years: Option<Vec<i32>>,

    /// Query deadline in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    pub timeout: u64,

    /// Output format
    #[arg(long = "format", default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}
