use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dutis_core::{resolve_application, AssignmentEngine, BundleInfo, Error, RoleSet, Settings, TypeKind};
use dutis_launchservices::LaunchServices;
use flexi_logger::{Logger, LoggerHandle};
use log::{debug, warn};
use std::path::PathBuf;
use std::process::ExitCode;

mod report;

const LOG_ENV: &str = "DUTIS_LOG";

#[derive(Parser)]
#[command(name = "dutis", version, about = "Inspect and change default application handlers")]
struct Cli {
    /// How to interpret TYPE: extension, mime, uti or scheme (inferred if omitted)
    #[arg(long, global = true, value_parser = parse_kind)]
    kind: Option<TypeKind>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Read settings from this plist instead of the default search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current handler for a type
    Get {
        #[arg(value_name = "TYPE")]
        target: String,
        #[arg(long, default_value = "all")]
        role: RoleSet,
    },
    /// Make an application the default handler for a type
    Set {
        #[arg(value_name = "TYPE")]
        target: String,
        /// Bundle identifier or path to an .app bundle
        #[arg(long)]
        app: String,
        #[arg(long, default_value = "all")]
        role: RoleSet,
        /// Assign even if the application does not declare the type
        #[arg(long)]
        force: bool,
    },
    /// Clear the default handler for a type
    Remove {
        #[arg(value_name = "TYPE")]
        target: String,
        #[arg(long, default_value = "all")]
        role: RoleSet,
    },
    /// Show the handler of every role for a type
    List {
        #[arg(value_name = "TYPE")]
        target: String,
    },
    /// List the applications able to handle a type, most preferred first
    Candidates {
        #[arg(value_name = "TYPE")]
        target: String,
        #[arg(long, default_value = "all")]
        role: RoleSet,
    },
    /// List the configured extension groups
    Groups,
    /// Assign one application to every extension in a group
    SetGroup {
        group: String,
        /// Bundle identifier or path to an .app bundle
        #[arg(long)]
        app: String,
        #[arg(long, default_value = "all")]
        role: RoleSet,
        #[arg(long)]
        force: bool,
    },
    /// Show what an application bundle declares
    Info { bundle: PathBuf },
}

fn parse_kind(value: &str) -> std::result::Result<TypeKind, String> {
    TypeKind::parse(value).ok_or_else(|| format!("unknown kind '{value}' (expected extension, mime, uti or scheme)"))
}

fn init_logging(verbose: u8) -> Option<LoggerHandle> {
    let spec = match verbose {
        0 => std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    match Logger::try_with_str(&spec).and_then(|logger| logger.log_to_stderr().start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("warning: failed to start logger: {err}");
            None
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::open(path)?,
        None => Settings::load(&Settings::default_paths())?,
    };
    Ok(settings)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::UnresolvedType { .. }) => 2,
        Some(Error::HandlerNotRegistered { .. }) => 3,
        Some(Error::PartialFailure(_)) => 4,
        Some(Error::RegistryUnavailable { .. }) => 5,
        Some(Error::RegistryRejected { .. }) => 6,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_ref())?;
    if !dutis_launchservices::is_supported() {
        warn!("event=registry_unsupported os={}", std::env::consts::OS);
    }
    let registry = LaunchServices::new();
    let engine = AssignmentEngine::new(&registry, &settings);
    let normalize = |target: &str| engine.normalize(target, cli.kind.unwrap_or_else(|| TypeKind::infer(target)));

    match &cli.command {
        Command::Get { target, role } => {
            let ty = normalize(target)?;
            let result = engine.get(&ty, *role)?;
            report::operation(&result, cli.json)?;
        }
        Command::Set {
            target,
            app,
            role,
            force,
        } => {
            let ty = normalize(target)?;
            let app = resolve_application(app)?;
            let result = engine.set(&ty, *role, &app, *force || settings.allow_unregistered);
            report::committed(result, cli.json)?;
        }
        Command::Remove { target, role } => {
            let ty = normalize(target)?;
            report::committed(engine.remove(&ty, *role), cli.json)?;
        }
        Command::List { target } => {
            let ty = normalize(target)?;
            report::assignments(&engine.list(&ty)?, cli.json)?;
        }
        Command::Candidates { target, role } => {
            let ty = normalize(target)?;
            report::candidates(&engine.candidates(&ty, *role)?, cli.json)?;
        }
        Command::Groups => report::groups(&settings.groups, cli.json)?,
        Command::SetGroup {
            group,
            app,
            role,
            force,
        } => {
            let extensions = settings.group(group)?;
            let app = resolve_application(app)?;
            let entries = engine.set_group(extensions, *role, &app, *force || settings.allow_unregistered);
            let failed = report::group_entries(&entries, cli.json)?;
            if failed > 0 {
                debug!("event=group_done group={group} failed={failed} total={}", entries.len());
                return Ok(ExitCode::from(4));
            }
        }
        Command::Info { bundle } => {
            let info = BundleInfo::open(bundle).with_context(|| format!("cannot read {}", bundle.display()))?;
            report::bundle(&info, cli.json)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _logger = init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
