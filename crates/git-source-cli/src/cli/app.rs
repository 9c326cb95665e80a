use super::*;
pub fn run() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(command = command_label(&cli.command), "Running command");

    match cli.command {
        Commands::Describe(args) => handle_describe(args),
        Commands::Sync(args) => handle_sync(args, &CliContext::load(cli.config, cli.cache_root)?),
        Commands::Status => handle_status(&CliContext::load(cli.config, cli.cache_root)?),
        Commands::Validate => handle_validate(&CliContext::load(cli.config, cli.cache_root)?),
    }
}
