//! taxflow: compiles an interview flow and resolves navigation and
//! checklist state against a persisted return.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taxflow_core::config::{AppConfig, LoggingConfig};
use taxflow_factgraph::demo::{demo_dictionary, submission_blocking_facts};
use taxflow_factgraph::MemoryFactGraph;
use taxflow_flow::demo::demo_flow;
use taxflow_flow::{
    ExternalContext, FeatureFlags, FlowConfig, FlowDecl, FlowResolver, ImportProfileState, SubmissionStatus,
};

#[derive(Parser, Debug)]
#[command(name = "taxflow")]
#[command(about = "Tax interview flow resolver")]
#[command(version)]
struct Cli {
    /// Flow description as JSON (default: the built-in demo flow)
    #[arg(long, global = true, env = "TAXFLOW_FLOW")]
    flow: Option<PathBuf>,

    /// Persisted fact state as JSON (default: an empty return)
    #[arg(long, global = true, env = "TAXFLOW_FACTS")]
    facts: Option<PathBuf>,

    /// Data import profile state as JSON (default: not loaded)
    #[arg(long, global = true, env = "TAXFLOW_IMPORT_PROFILE")]
    import_profile: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "TAXFLOW_CONFIG")]
    config: Option<String>,

    /// Show experimental screens (overrides config)
    #[arg(long, global = true)]
    experimental: Option<bool>,

    /// Use the ESSAR signing path (overrides config)
    #[arg(long, global = true)]
    essar_signing: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile the flow and report its size
    Validate,

    /// List screen routes in flow order
    Routes {
        /// Start listing at this screen route
        #[arg(long)]
        from: Option<String>,
    },

    /// Find the first incomplete screen
    Next {
        /// Subcategory route (default: the first one that is not complete)
        #[arg(long)]
        subcategory: Option<String>,

        /// Collection item the subcategory is shown for
        #[arg(long)]
        collection_id: Option<String>,
    },

    /// Print the checklist state as JSON
    Checklist {
        /// Latest submission status as JSON
        #[arg(long)]
        submission_status: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowSummary {
    categories: usize,
    subcategories: usize,
    loops: usize,
    screens: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NextOutput {
    subcategory_route: String,
    screen_route: Option<String>,
    url: Option<String>,
    collection_id: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_flow(path: Option<&Path>) -> anyhow::Result<FlowConfig> {
    let decl = match path {
        Some(path) => FlowDecl::from_json_str(&read(path)?)
            .with_context(|| format!("invalid flow description in {}", path.display()))?,
        None => demo_flow(),
    };
    Ok(FlowConfig::compile(&decl)?)
}

fn load_facts(path: Option<&Path>) -> anyhow::Result<MemoryFactGraph> {
    match path {
        Some(path) => MemoryFactGraph::from_json_str(demo_dictionary(), &read(path)?)
            .with_context(|| format!("invalid fact state in {}", path.display())),
        None => Ok(MemoryFactGraph::new(demo_dictionary())),
    }
}

fn load_import_profile(path: Option<&Path>) -> anyhow::Result<ImportProfileState> {
    match path {
        Some(path) => serde_json::from_str(&read(path)?)
            .with_context(|| format!("invalid import profile in {}", path.display())),
        None => Ok(ImportProfileState::default()),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn next_screen(
    resolver: &FlowResolver<'_>,
    knockout_category_route: &str,
    subcategory: Option<&str>,
    collection_id: Option<String>,
) -> anyhow::Result<Option<NextOutput>> {
    let flow = resolver.flow();
    let sub = match subcategory {
        Some(route) => flow
            .subcategory_by_route(route)
            .with_context(|| format!("no subcategory with route {route}"))?,
        None => {
            let first_open = flow.subcategories().iter().find(|sub| {
                sub.category_route != knockout_category_route
                    && !resolver.is_subcategory_complete(sub.id, resolver.default_collection_id(sub).as_deref())
            });
            match first_open {
                Some(sub) => sub,
                None => return Ok(None),
            }
        }
    };

    let collection_id = collection_id.or_else(|| resolver.default_collection_id(sub));
    let location = resolver.find_first_incomplete_screen_of_subcategory(sub.id, collection_id.as_deref());
    Ok(Some(match location {
        Some(location) => {
            let screen = flow.screen(location.screen);
            NextOutput {
                subcategory_route: sub.route.clone(),
                screen_route: Some(screen.screen_route.clone()),
                url: Some(screen.full_route(location.collection_id.as_deref(), false)),
                collection_id: location.collection_id,
            }
        }
        None => NextOutput {
            subcategory_route: sub.route.clone(),
            screen_route: None,
            url: None,
            collection_id,
        },
    }))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, config_error) = match AppConfig::load_from(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) if cli.config.is_none() => (AppConfig::default(), Some(e)),
        Err(e) => return Err(e).context("failed to load configuration"),
    };
    init_tracing(&config.logging);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    // Apply CLI overrides
    if let Some(experimental) = cli.experimental {
        config.flags.experimental = experimental;
    }
    if let Some(essar) = cli.essar_signing {
        config.flags.essar_signing_enabled = essar;
    }

    info!(
        tax_year = config.interview.tax_year,
        experimental = config.flags.experimental,
        essar_signing = config.flags.essar_signing_enabled,
        "Configuration loaded"
    );

    let flow = load_flow(cli.flow.as_deref())?;

    match cli.command {
        Commands::Validate => print_json(&FlowSummary {
            categories: flow.categories().len(),
            subcategories: flow.subcategories().len(),
            loops: flow.loops().len(),
            screens: flow.screens().len(),
        }),
        Commands::Routes { from } => {
            let routes: Vec<&str> = match from.as_deref() {
                Some(route) => {
                    let routes = flow.routes_from(route);
                    anyhow::ensure!(!routes.is_empty(), "no screen with route {route}");
                    routes
                }
                None => flow.screens().iter().map(|s| s.screen_route.as_str()).collect(),
            };
            for route in routes {
                println!("{route}");
            }
            Ok(())
        }
        Commands::Next {
            subcategory,
            collection_id,
        } => {
            let graph = load_facts(cli.facts.as_deref())?;
            let ctx = ExternalContext::new(FeatureFlags::from(&config.flags))
                .with_import_profile(load_import_profile(cli.import_profile.as_deref())?)
                .with_submission_blocking_facts(submission_blocking_facts());
            let resolver = FlowResolver::new(&flow, &graph, &ctx);
            let next = next_screen(
                &resolver,
                &config.interview.knockout_category_route,
                subcategory.as_deref(),
                collection_id,
            )?;
            if next.is_none() {
                info!("Every subcategory is complete");
            }
            print_json(&next)
        }
        Commands::Checklist { submission_status } => {
            let graph = load_facts(cli.facts.as_deref())?;
            let ctx = ExternalContext::new(FeatureFlags::from(&config.flags))
                .with_import_profile(load_import_profile(cli.import_profile.as_deref())?)
                .with_submission_blocking_facts(submission_blocking_facts());
            let status: Option<SubmissionStatus> = match submission_status {
                Some(path) => Some(
                    serde_json::from_str(&read(&path)?)
                        .with_context(|| format!("invalid submission status in {}", path.display()))?,
                ),
                None => None,
            };
            let resolver = FlowResolver::new(&flow, &graph, &ctx);
            let state = resolver.checklist_state(
                status.as_ref(),
                &[config.interview.knockout_category_route.as_str()],
            );
            print_json(&state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use taxflow_core::{Collection, ConcretePath, FactGraph, FactValue};

    fn resolver_output(graph: &MemoryFactGraph, subcategory: Option<&str>) -> Option<NextOutput> {
        let flow = FlowConfig::compile(&demo_flow()).unwrap();
        let ctx = ExternalContext::default();
        let resolver = FlowResolver::new(&flow, graph, &ctx);
        next_screen(&resolver, "/flow/knockout", subcategory, None).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn first_open_subcategory_resumes_at_its_missing_fact() {
        let mut graph = MemoryFactGraph::new(demo_dictionary());
        graph
            .set(
                &ConcretePath::parse("/filers").unwrap(),
                FactValue::Collection(Collection::new(["f1"])),
            )
            .unwrap();
        graph.save().unwrap();

        let next = resolver_output(&graph, None).unwrap();
        assert_eq!(next.subcategory_route, "/flow/you-and-your-family/about-you");
        assert_eq!(
            next.screen_route.as_deref(),
            Some("/flow/you-and-your-family/about-you/about-you-name")
        );
        assert_eq!(next.collection_id.as_deref(), Some("f1"));
    }

    #[test]
    fn unknown_subcategory_is_an_error() {
        let flow = FlowConfig::compile(&demo_flow()).unwrap();
        let graph = MemoryFactGraph::new(demo_dictionary());
        let ctx = ExternalContext::default();
        let resolver = FlowResolver::new(&flow, &graph, &ctx);
        assert!(next_screen(&resolver, "/flow/knockout", Some("/flow/nowhere"), None).is_err());
    }
}
