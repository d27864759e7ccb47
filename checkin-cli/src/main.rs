use std::fs;
use std::path::{Path, PathBuf};

use checkin_core::config::load_core_config;
use checkin_core::logging::init_tracing;
use checkin_core::serde_utils::to_pretty_json;
use checkin_core::CoreConfig;
use checkin_rules::{
    load_rule, to_dnf_bounded, Catalog, EditCommand, FlowGraph, Lookup, LookupId, LookupSession,
    NodePath, RuleApiBuilder, RuleEditor, RuleServiceConfig, SvgRenderer, TimeKind, TimeSpec,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;

mod output;

use output::{print_edit_applied, print_graph, print_lookup_page, print_tree, CliError};

#[derive(Parser)]
#[command(name = "checkin")]
#[command(about = "Edit, normalize and visualize check-in rules", long_about = None)]
struct Cli {
    /// Variable/operator table to use instead of the built-in one
    #[arg(long, global = true, env = "CHECKIN_CATALOG")]
    catalog: Option<PathBuf>,
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, env = "CHECKIN_LOG")]
    log: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the editor tree of a rule
    Show { file: PathBuf },
    /// Print the disjunctive normal form of a rule
    Dnf {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
    /// Print the flow-graph layout of a rule
    Graph {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Render the flow graph of a rule as SVG
    Render {
        file: PathBuf,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Lay out the DNF instead of the rule as written
        #[arg(long, default_value_t = false)]
        normalize: bool,
    },
    /// Apply one editor command to a rule file
    Edit(EditArgs),
    /// Print the variable/operator table
    Catalog {
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
    /// Serve the rule analysis HTTP API
    Serve {
        #[arg(long, env = "CHECKIN_HTTP_BIND")]
        bind: Option<String>,
    },
    /// Search products or variations through the shop endpoint
    Lookup {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, env = "CHECKIN_LOOKUP_URL")]
        url: Option<String>,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Args)]
struct EditArgs {
    file: PathBuf,
    /// Node to edit, e.g. `root` or `0.2`
    #[arg(long, default_value = "root")]
    at: String,
    /// Write the result back instead of printing it
    #[arg(long, default_value_t = false)]
    write: bool,
    #[command(subcommand)]
    command: EditCommands,
}

#[derive(Subcommand)]
enum EditCommands {
    /// Pick a variable, or `and`/`or`
    Variable { name: String },
    /// Pick an operator
    Operator { op: String },
    /// Set the number to compare with
    Number {
        #[arg(allow_hyphen_values = true)]
        value: i64,
    },
    /// Set the products or variations, given as `ID=TEXT`
    Objects {
        #[arg(long, default_value = "product")]
        kind: String,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Set the point in time (date_from, date_to, date_admission, custom, customtime)
    Time { kind: String, value: Option<String> },
    /// Set the tolerance in minutes
    Tolerance { minutes: i64 },
    /// Append an empty condition to an and/or node
    Add,
    Remove,
    Duplicate,
    WrapAnd,
    WrapOr,
    /// Replace a single-child and/or node by its child
    Cut,
}

impl EditCommands {
    fn into_command(self) -> Result<EditCommand, CliError> {
        let command = match self {
            EditCommands::Variable { name } => EditCommand::SetVariable { name },
            EditCommands::Operator { op } => EditCommand::SetOperator { op },
            EditCommands::Number { value } => EditCommand::SetNumber { value },
            EditCommands::Objects { kind, items } => EditCommand::SetObjectList {
                items: items
                    .iter()
                    .map(|raw| parse_lookup_item(&kind, raw))
                    .collect::<Result<_, _>>()?,
            },
            EditCommands::Time { kind, value } => EditCommand::SetTime {
                time: parse_time(&kind, value)?,
            },
            EditCommands::Tolerance { minutes } => EditCommand::SetTolerance { minutes },
            EditCommands::Add => EditCommand::AddCondition,
            EditCommands::Remove => EditCommand::Remove,
            EditCommands::Duplicate => EditCommand::Duplicate,
            EditCommands::WrapAnd => EditCommand::WrapAnd,
            EditCommands::WrapOr => EditCommand::WrapOr,
            EditCommands::Cut => EditCommand::Cut,
        };
        Ok(command)
    }
}

fn parse_lookup_item(kind: &str, raw: &str) -> Result<Lookup, CliError> {
    let (id, text) = raw
        .split_once('=')
        .ok_or_else(|| CliError::Validation(format!("expected ID=TEXT, got '{}'", raw)))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::Validation(format!("missing id in '{}'", raw)));
    }
    let id = id
        .parse::<i64>()
        .map(LookupId::Int)
        .unwrap_or_else(|_| LookupId::Str(id.to_string()));
    Ok(Lookup::new(kind, id, text.trim()))
}

fn parse_time(kind: &str, value: Option<String>) -> Result<TimeSpec, CliError> {
    let kind = TimeKind::parse(kind)
        .ok_or_else(|| CliError::Validation(format!("unknown time kind '{}'", kind)))?;
    match (kind.takes_value(), value) {
        (true, Some(value)) => Ok(TimeSpec {
            kind,
            value: Some(value),
        }),
        (true, None) => Err(CliError::Validation(format!(
            "time kind '{}' needs a value",
            kind.as_str()
        ))),
        (false, _) => Ok(TimeSpec::new(kind)),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog, CliError> {
    match path {
        Some(path) => Ok(Catalog::from_path(path)?),
        None => Ok(Catalog::builtin()),
    }
}

fn emit(output: Option<&Path>, contents: &str) -> Result<(), CliError> {
    match output {
        Some(path) => fs::write(path, contents).map_err(|err| CliError::write(path, err)),
        None => {
            print!("{}", contents);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = load_core_config()?;
    init_tracing(Some(cli.log.as_deref().unwrap_or(config.effective_log_level())))?;

    let catalog_path = cli.catalog.clone().or_else(|| config.catalog_path.clone());
    let catalog = load_catalog(catalog_path.as_deref())?;
    debug!(version = catalog.version, "catalog ready");

    match cli.command {
        Commands::Show { file } => {
            let editor = RuleEditor::with_catalog(load_rule(&file)?, catalog);
            print_tree(&editor.view(), editor.catalog());
        }
        Commands::Dnf { file, compact } => {
            let normalized = to_dnf_bounded(&load_rule(&file)?, config.dnf_max_terms)?;
            if compact {
                println!("{}", normalized.to_json_string());
            } else {
                println!("{}", to_pretty_json(&normalized)?);
            }
        }
        Commands::Graph { file, json } => {
            let graph = FlowGraph::build(&load_rule(&file)?);
            if json {
                println!("{}", to_pretty_json(&graph)?);
            } else {
                print_graph(&graph, &catalog);
            }
        }
        Commands::Render {
            file,
            output,
            normalize,
        } => {
            let mut rule = load_rule(&file)?;
            if normalize {
                rule = to_dnf_bounded(&rule, config.dnf_max_terms)?;
            }
            let graph = FlowGraph::build(&rule);
            let svg = SvgRenderer::new(&catalog).render(&graph);
            emit(output.as_deref(), &svg)?;
        }
        Commands::Edit(args) => {
            let path: NodePath = args.at.parse()?;
            let command = args.command.into_command()?;
            let name = command.name();

            let mut editor = RuleEditor::with_catalog(load_rule(&args.file)?, catalog);
            editor.apply(&path, command)?;
            if args.write {
                fs::write(&args.file, editor.serialized())
                    .map_err(|err| CliError::write(&args.file, err))?;
                print_edit_applied(name, &path, editor.revision());
            } else {
                println!("{}", editor.serialized());
            }
        }
        Commands::Catalog { format } => {
            let rendered = match format {
                Format::Json => to_pretty_json(&catalog)?,
                Format::Yaml => serde_yaml::to_string(&catalog)
                    .map_err(|err| CliError::Validation(err.to_string()))?,
            };
            println!("{}", rendered.trim_end());
        }
        Commands::Serve { bind } => {
            let mut service_config = RuleServiceConfig::from(&config);
            if let Some(bind_address) = bind {
                service_config.bind_address = bind_address;
            }
            let address = service_config.bind_address.clone();
            let shutdown = RuleApiBuilder::new(catalog)
                .serve(service_config)
                .await
                .map_err(|err| CliError::Serve(err.to_string()))?;
            println!("Rule service listening on http://{} (Ctrl-C to stop)", address);
            tokio::signal::ctrl_c()
                .await
                .map_err(|err| CliError::Serve(err.to_string()))?;
            let _ = shutdown.send(());
        }
        Commands::Lookup { query, page, url } => {
            let config = CoreConfig {
                lookup_url: url.or(config.lookup_url),
                ..config
            };
            let session = LookupSession::from_config(&config)?.ok_or_else(|| {
                CliError::Validation("no lookup endpoint, set CHECKIN_LOOKUP_URL or --url".into())
            })?;
            if let Some(result) = session.search_latest(&query, page).await? {
                print_lookup_page(&result);
            }
        }
        Commands::Version => {
            println!("checkin v{}", env!("CARGO_PKG_VERSION"));
            println!("rule catalog version {}", catalog.version);
        }
    }

    Ok(())
}
