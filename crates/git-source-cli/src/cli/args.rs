use super::*;
#[derive(Parser)]
#[command(author, version, about = "Mirror git repositories and register their files")]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Path to config.json")]
    pub(super) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory that holds the mirrors")]
    pub(super) cache_root: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Sync configured repositories and register their files")]
    Sync(SyncArgs),
    #[command(about = "Show the local state of every configured mirror")]
    Status,
    #[command(about = "Validate the config file")]
    Validate,
    #[command(about = "Print the descriptor for a remote without touching the network")]
    Describe(DescribeArgs),
}

#[derive(Parser)]
pub(super) struct SyncArgs {
    #[arg(long, help = "Only sync the named repository (repeatable)")]
    pub(super) repo: Vec<String>,
    #[arg(long, help = "Number of repositories synced at once")]
    pub(super) jobs: Option<usize>,
    #[arg(long, help = "Per-repository time budget in seconds")]
    pub(super) timeout_secs: Option<u64>,
    #[arg(long, help = "Path to the record manifest")]
    pub(super) manifest: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = SHALLOW_DEPTH,
        help = "History depth for network remotes; 0 fetches full history"
    )]
    pub(super) depth: i32,
    #[arg(long, help = "Let glob wildcards match dotfiles")]
    pub(super) include_dotfiles: bool,
    #[arg(long, help = "Render a progress line while syncing")]
    pub(super) progress: bool,
}

#[derive(Parser)]
pub(super) struct DescribeArgs {
    pub(super) remote: String,
    #[arg(long = "ref", default_value = "main")]
    pub(super) git_ref: String,
    #[arg(long, help = "Repository name; defaults to the name in the remote")]
    pub(super) name: Option<String>,
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Sync(_) => "sync",
        Commands::Status => "status",
        Commands::Validate => "validate",
        Commands::Describe(_) => "describe",
    }
}
