//! Lip Package Manager (lip)

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use lip::commands::{self, InstallOptions};
use lip::{Config, ConfigKey, Context, RecordStore, Verbosity};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lip")]
#[command(about = "A general package installer", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Show errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install teeth from archives or repos
    Install {
        /// Archive paths or repo[@version] specifiers
        #[arg(required = true)]
        specifiers: Vec<String>,
        /// Upgrade installed teeth to the resolved version
        #[arg(long)]
        upgrade: bool,
        /// Reinstall teeth that are already installed
        #[arg(long)]
        force_reinstall: bool,
        /// Do not install dependencies
        #[arg(long)]
        no_dependencies: bool,
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Uninstall installed teeth
    Uninstall {
        #[arg(required = true)]
        repos: Vec<String>,
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// List installed teeth
    List {
        /// Only teeth with a newer stable release
        #[arg(long)]
        upgradable: bool,
        #[arg(long)]
        json: bool,
    },
    /// Write installed teeth as repo@version lines
    Freeze {
        #[arg(default_value = "specifiers.txt")]
        output: PathBuf,
    },
    /// Show the installed record of a tooth
    Show {
        repo: String,
        #[arg(long)]
        json: bool,
    },
    /// Manage the download cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Tooth authoring helpers
    Tooth {
        #[command(subcommand)]
        command: ToothCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached downloads
    List,
    /// Remove every cached download
    Purge,
}

#[derive(Subcommand)]
enum ConfigCommand {
    Get { key: ConfigKey },
    Set { key: ConfigKey, value: String },
}

#[derive(Subcommand)]
enum ToothCommand {
    /// Create a tooth.json in the current directory
    Init,
    /// Pack the current directory into a .tth archive
    Pack {
        #[arg(short, long, default_value = "tooth.tth")]
        output: PathBuf,
    },
}

fn init_tracing(verbosity: Verbosity) {
    let default_level = match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "info",
        Verbosity::Verbose => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lip={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn main() {
    let cli = Cli::parse();

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    init_tracing(verbosity);

    if let Err(e) = run(cli.command, verbosity) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, verbosity: Verbosity) -> anyhow::Result<()> {
    let workspace = std::env::current_dir().context("Failed to get current directory")?;
    let ctx = Context::load(workspace, verbosity).context("Failed to load configuration")?;

    match command {
        Commands::Install {
            specifiers,
            upgrade,
            force_reinstall,
            no_dependencies,
            yes,
        } => {
            if !yes && !confirm(&format!("Install {}?", specifiers.join(", ")))? {
                return Ok(());
            }
            ctx.create_dirs().context("Failed to create lip directories")?;
            let registry = ctx.registry()?;
            let options = InstallOptions {
                upgrade,
                force_reinstall,
                no_dependencies,
            };
            let report = commands::install_specifiers(&ctx, &registry, &specifiers, options)?;
            for tooth in report.installed.iter().chain(&report.reinstalled) {
                println!("Installed {}", tooth);
            }
        }
        Commands::Uninstall { repos, yes } => {
            if !yes && !confirm(&format!("Uninstall {}?", repos.join(", ")))? {
                return Ok(());
            }
            for repo in commands::uninstall_teeth(&ctx, &repos)? {
                println!("Uninstalled {}", repo);
            }
        }
        Commands::List { upgradable, json } => {
            if upgradable {
                let registry = ctx.registry()?;
                let teeth = commands::list_upgradable(&ctx, &registry)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&teeth)?);
                } else {
                    for tooth in teeth {
                        println!("{} {} -> {}", tooth.repo, tooth.installed, tooth.latest);
                    }
                }
            } else {
                let teeth = commands::list_installed(&ctx)?;
                if json {
                    let raw: Vec<_> = teeth.iter().map(|m| m.to_raw()).collect();
                    println!("{}", serde_json::to_string_pretty(&raw)?);
                } else {
                    for tooth in teeth {
                        println!("{} {}", tooth.repo(), tooth.version());
                    }
                }
            }
        }
        Commands::Freeze { output } => {
            let output = ctx.workspace_dir().join(output);
            let specifiers = commands::freeze_to_file(&ctx, &output)?;
            println!("Wrote {} specifiers to {}", specifiers.len(), output.display());
        }
        Commands::Show { repo, json } => {
            let Some(metadata) = RecordStore::new(ctx.metadata_dir()).get_installed(&repo)? else {
                bail!("Tooth {} is not installed", repo);
            };
            if json {
                println!("{}", String::from_utf8_lossy(&metadata.to_json()?));
            } else {
                let info = metadata.info();
                println!("Tooth: {}", metadata.repo());
                println!("Version: {}", metadata.version());
                println!("Name: {}", info.name);
                println!("Description: {}", info.description);
                println!("Author: {}", info.author);
                if !info.tags.is_empty() {
                    println!("Tags: {}", info.tags.join(", "));
                }
                for (dep, range) in metadata.dependencies() {
                    println!("Dependency: {} {}", dep, range);
                }
            }
        }
        Commands::Cache { command } => {
            let cache = ctx.cache()?;
            match command {
                CacheCommand::List => {
                    for entry in cache.entries()? {
                        println!("{} {} {}", entry.sha256, entry.size, entry.url);
                    }
                }
                CacheCommand::Purge => {
                    let removed = cache.purge()?;
                    println!("Removed {} cached files", removed);
                }
            }
        }
        Commands::Config { command } => match command {
            ConfigCommand::Get { key } => println!("{}", ctx.config().get(key)),
            ConfigCommand::Set { key, value } => {
                let mut config: Config = ctx.config().clone();
                config.set(key, &value)?;
                config.save(&ctx.config_path())?;
            }
        },
        Commands::Tooth { command } => match command {
            ToothCommand::Init => {
                let path = commands::init_manifest(ctx.workspace_dir())?;
                println!("Created {}", path.display());
            }
            ToothCommand::Pack { output } => {
                let output = ctx.workspace_dir().join(output);
                let files = commands::pack_tooth(ctx.workspace_dir(), &output)?;
                println!("Packed {} files into {}", files.len(), output.display());
            }
        },
    }

    Ok(())
}
