use anyhow::Result;
use clap::Parser;
use extra_node_modules::{commands, config::ConfigOverrides, runtime::RealRuntime};
use std::path::PathBuf;

/// extra-node-modules - split a bundle into publishable npm packages
///
/// Every configured input file becomes its own package, named after its path.
/// Code shared between inputs goes to a chunks package, type declarations to an
/// assets package, and an all-shared package re-exports everything.
///
/// Options are read from node-modules.config.json in the working directory.
/// If the NPM_TOKEN environment variable is set, it is used to query the registry.
///
/// Examples:
///   extra-node-modules input                     # Show the bundler input map
///   extra-node-modules emit --bundle bundle.json # Write the packages into outDir
#[derive(Parser, Debug)]
#[command(author, version = env!("EXTRA_NODE_MODULES_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory the config, inputs and package.json are resolved from
    #[arg(long, value_name = "PATH", global = true)]
    pub cwd: Option<PathBuf>,

    /// Config file (defaults to node-modules.config.json in the working directory)
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// npm registry URL (also via FETCH_REPOSITORY or NPM_CONFIG_REGISTRY)
    #[arg(long, value_name = "URL", global = true)]
    pub registry: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the package name a source file resolves to
    Resolve(ResolveArgs),

    /// Show the bundler input map
    Input,

    /// Split a bundle into node modules and write them
    Emit(EmitArgs),

    /// Show the output file naming patterns
    OutputNames,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Source files to resolve
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Ignore configured name overrides
    #[arg(long)]
    pub ignore_overrides: bool,
}

#[derive(clap::Args, Debug)]
pub struct EmitArgs {
    /// JSON file describing the bundler's final outputs, keyed by file name
    #[arg(long, value_name = "FILE")]
    pub bundle: PathBuf,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cwd: self.cwd.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let overrides = cli.overrides();

    match cli.command {
        Commands::Resolve(args) => {
            commands::resolve(runtime, overrides, &args.paths, args.ignore_overrides)?
        }
        Commands::Input => commands::input(runtime, overrides)?,
        Commands::Emit(args) => commands::emit(runtime, overrides, &args.bundle).await?,
        Commands::OutputNames => commands::output_names(runtime, overrides)?,
    }
    Ok(())
}
