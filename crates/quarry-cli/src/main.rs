use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quarry_config::{QuarryConfig, RepositoryConfig, QUARRY_CONFIG_FILE_NAME};
use quarry_core::{ArtifactKind, ProgressConsumer};
use quarry_resolver::{ArtifactRepositoryManager, ErrorKind, ResolutionError};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "quarry", version, about = "Quarry CLI (Maven artifact resolution)")]
struct Cli {
    /// Config file (defaults to `quarry.toml` in the current directory, when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Local repository directory
    #[arg(long, global = true)]
    local_repo: Option<PathBuf>,
    /// Remote repository as `ID=URL`; replaces the configured repositories. Repeatable.
    #[arg(long = "repo", global = true, value_name = "ID=URL")]
    repos: Vec<String>,
    /// Resolve from the local repository only
    #[arg(long, global = true)]
    offline: bool,
    /// Validate cached jar/zip files before using them
    #[arg(long, global = true)]
    strict: bool,
    /// Emit JSON suitable for scripts
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a dependency into files in the local repository
    Resolve(ResolveArgs),
    /// Print the mediated dependency tree, including rejected versions
    Tree(TreeArgs),
    /// List available versions of an artifact
    Versions(VersionsArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// `groupId:artifactId:version`, where version may be a range such as `[1.0,2.0)`
    coordinate: String,
    /// Artifact kinds to fetch (artifact, sources, javadoc, ...). Repeatable.
    #[arg(long = "kind", value_parser = parse_kind, default_value = "artifact")]
    kinds: Vec<ArtifactKind>,
    /// Only resolve the artifact itself
    #[arg(long)]
    no_transitive: bool,
    /// Dependencies to leave out, as `groupId:artifactId` (`*` matches any). Repeatable.
    #[arg(long = "exclude", value_name = "GROUP:ARTIFACT")]
    excludes: Vec<String>,
}

#[derive(Args)]
struct TreeArgs {
    /// `groupId:artifactId:version`
    coordinate: String,
}

#[derive(Args)]
struct VersionsArgs {
    /// `groupId:artifactId`
    artifact: String,
    /// Version constraint; every known version when omitted
    #[arg(default_value = "")]
    constraint: String,
    #[arg(long, value_parser = parse_kind, default_value = "artifact")]
    kind: ArtifactKind,
}

/// Forwards transfer progress to the log.
struct LogProgress;

impl ProgressConsumer for LogProgress {
    fn consume(&self, message: &str) {
        tracing::debug!(target = "quarry.cli", "{message}");
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };

    std::process::exit(exit_code);
}

/// 1 when the requested artifact or version does not exist, 2 for everything else.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    let miss = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ResolutionError>())
        .any(|cause| cause.kind() == ErrorKind::NotFound);
    if miss {
        1
    } else {
        2
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    quarry_config::init_tracing(&config.logging);

    let manager = ArtifactRepositoryManager::from_config(&config, Some(Arc::new(LogProgress)))?;
    tracing::debug!(target = "quarry.cli", manager = ?manager, "configured");

    match cli.command {
        Command::Resolve(args) => {
            let (group_id, artifact_id, constraint) = split_coordinate(&args.coordinate)?;
            let artifacts = manager.resolve_dependency_as_artifact(
                group_id,
                artifact_id,
                constraint,
                &args.kinds,
                !args.no_transitive,
                &args.excludes,
            )?;
            if cli.json {
                print_json(&artifacts)?;
            } else {
                for artifact in &artifacts {
                    println!("{}", artifact.file.display());
                }
            }
        }
        Command::Tree(args) => {
            let (group_id, artifact_id, constraint) = split_coordinate(&args.coordinate)?;
            let tree = manager.collect_dependencies(group_id, artifact_id, constraint)?;
            if cli.json {
                print_json(&tree)?;
            } else {
                print!("{tree}");
            }
        }
        Command::Versions(args) => {
            let Some((group_id, artifact_id)) = args.artifact.split_once(':') else {
                bail!("expected groupId:artifactId, got {:?}", args.artifact);
            };
            let versions =
                manager.get_available_versions(group_id, artifact_id, &args.constraint, args.kind)?;
            if cli.json {
                print_json(&versions)?;
            } else {
                for version in &versions {
                    println!("{version}");
                }
            }
        }
    }
    Ok(0)
}

fn load_config(cli: &Cli) -> Result<QuarryConfig> {
    let default_path = Path::new(QUARRY_CONFIG_FILE_NAME);
    let path = match &cli.config {
        Some(path) => Some(path.as_path()),
        None if default_path.is_file() => Some(default_path),
        None => None,
    };
    let mut config = QuarryConfig::load(path).with_context(|| match path {
        Some(path) => format!("loading {}", path.display()),
        None => "loading default configuration".to_string(),
    })?;

    if let Some(local) = &cli.local_repo {
        config.local_repository = Some(local.clone());
    }
    if cli.offline {
        config.offline = true;
    }
    if cli.strict {
        config.strict_validation = true;
    }
    if !cli.repos.is_empty() {
        config.repositories = cli
            .repos
            .iter()
            .map(|spec| parse_repository(spec))
            .collect::<Result<_>>()?;
    }
    Ok(config)
}

fn parse_repository(spec: &str) -> Result<RepositoryConfig> {
    let Some((id, url)) = spec.split_once('=') else {
        bail!("expected ID=URL for --repo, got {spec:?}");
    };
    Ok(RepositoryConfig {
        id: id.trim().to_string(),
        url: url.trim().to_string(),
        username: None,
        password: None,
    })
}

fn parse_kind(name: &str) -> Result<ArtifactKind, String> {
    ArtifactKind::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ArtifactKind::ALL_KINDS.iter().map(|k| k.name()).collect();
        format!("unknown kind {name:?} (expected one of {})", known.join(", "))
    })
}

/// Splits `group:artifact:constraint`; the constraint itself may not contain `:`.
fn split_coordinate(text: &str) -> Result<(&str, &str, &str)> {
    let mut parts = text.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(group_id), Some(artifact_id), Some(constraint))
            if !group_id.is_empty() && !artifact_id.is_empty() && !constraint.contains(':') =>
        {
            Ok((group_id, artifact_id, constraint))
        }
        _ => bail!("expected groupId:artifactId:version, got {text:?}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
