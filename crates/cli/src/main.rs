use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use excerpo_core::{
    AnytypeClient, Category, CredentialStore, ExcerpoError, ExportController, ExtractConfig,
    FetchConfig, PreferenceStore, Storage, fetch_file, fetch_stdin, fetch_url,
};
use owo_colors::OwoColorize;

mod echo;
use echo::{print_banner, print_error, print_info, print_step, print_success, print_warning};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clip web articles to Markdown and export them to a local knowledge base
#[derive(Parser, Debug)]
#[command(name = "excerpo")]
#[command(author = "Excerpo Contributors")]
#[command(version)]
#[command(about = "Clip web pages to Markdown and export them", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base URL of the knowledge-base service
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Storage file override (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    storage: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a page and print its Markdown
    Clip {
        /// URL to fetch, local HTML file, or "-" for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Content category (article, research); auto-detected for URLs
        #[arg(short, long, value_name = "KEY")]
        category: Option<String>,

        /// HTTP timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        timeout: u64,

        /// Custom User-Agent for HTTP requests
        #[arg(long, value_name = "UA")]
        user_agent: Option<String>,

        /// Character threshold for classifying research containers
        #[arg(long, default_value = "500", value_name = "NUM")]
        research_threshold: usize,
    },

    /// Pair with the local knowledge-base application
    Pair,

    /// Remove the stored pairing credential
    Unpair,

    /// Show service health and pairing state
    Status,

    /// List available spaces
    Spaces,

    /// List object types in a space
    Types {
        #[arg(value_name = "SPACE_ID")]
        space_id: String,
    },

    /// Clip a page and export every block to the knowledge base
    Export {
        /// URL to fetch, local HTML file, or "-" for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Content category (article, research); auto-detected for URLs
        #[arg(short, long, value_name = "KEY")]
        category: Option<String>,

        /// Target space id (default: last used, else first available)
        #[arg(long, value_name = "SPACE_ID")]
        space: Option<String>,

        /// Target type id (default: last used, else first available)
        #[arg(long = "type", value_name = "TYPE_ID")]
        type_id: Option<String>,

        /// Template id to apply (default: last used if still present)
        #[arg(long, value_name = "TEMPLATE_ID")]
        template: Option<String>,

        /// Tag id to assign; repeatable
        #[arg(long = "tag", value_name = "TAG_ID")]
        tags: Vec<String>,

        /// Object title override (default: derived from the content)
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,

        /// HTTP timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        timeout: u64,

        /// Character threshold for classifying research containers
        #[arg(long, default_value = "500", value_name = "NUM")]
        research_threshold: usize,
    },

    /// Show or change settings
    Settings {
        /// Turn the export feature on or off
        #[arg(long, value_name = "on|off")]
        export: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        print_banner();
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "excerpo=debug,excerpo_core=debug".into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let storage = match &args.storage {
        Some(path) => Storage::with_path(path.clone()),
        None => Storage::open_default()?,
    };

    match args.command {
        Command::Clip { input, output, category, timeout, user_agent, research_threshold } => {
            let (html, source_url) = load_input(&input, timeout, user_agent, args.verbose).await?;
            let category = resolve_category(category.as_deref(), source_url.as_deref())?;

            if args.verbose {
                print_step(1, 2, &format!("Extracting as {}", category.display_name()));
            }

            let config = ExtractConfig { research_char_threshold: research_threshold, ..Default::default() };
            let blocks = excerpo_core::extract(&html, category, &config)?;
            let markdown = join_blocks(&blocks);

            if args.verbose {
                print_step(2, 2, "Writing output");
            }

            match output {
                Some(path) => {
                    fs::write(&path, markdown)
                        .with_context(|| format!("Failed to write to file: {}", path.display()))?;
                    print_success(&format!("Output written to {}", path.display()));
                }
                None => {
                    print!("{}", markdown);
                }
            }
        }

        Command::Pair => {
            let mut controller = build_controller(storage, args.base_url)?;
            run_pairing(&mut controller).await?;
        }

        Command::Unpair => {
            let controller = build_controller(storage, args.base_url)?;
            controller.client().clear_pairing()?;
            print_success("Pairing credential removed");
        }

        Command::Status => {
            let controller = build_controller(storage, args.base_url)?;

            if controller.client().check_health().await {
                print_success("Service is running");
            } else {
                print_warning("Service is not reachable; is the application running?");
            }

            if controller.client().is_paired().await {
                print_success("Paired");
            } else {
                print_info("Not paired (run `excerpo pair`)");
            }

            let enabled = controller.preferences().export_enabled()?;
            print_info(&format!("Export feature: {}", if enabled { "on" } else { "off" }));
        }

        Command::Spaces => {
            let controller = build_controller(storage, args.base_url)?;
            let spaces = controller.client().list_spaces().await.map_err(guided)?;
            if spaces.is_empty() {
                print_info("No spaces available");
            }
            for space in spaces {
                println!("{}  {}", space.id, space.name.as_deref().unwrap_or("").dimmed());
            }
        }

        Command::Types { space_id } => {
            let controller = build_controller(storage, args.base_url)?;
            let types = controller.client().list_types(&space_id).await.map_err(guided)?;
            if types.is_empty() {
                print_info("No object types available");
            }
            for object_type in types {
                println!(
                    "{}  {}  {}",
                    object_type.id,
                    object_type.key.as_deref().unwrap_or("").dimmed(),
                    object_type.name.as_deref().unwrap_or("").dimmed()
                );
            }
        }

        Command::Export {
            input,
            category,
            space,
            type_id,
            template,
            tags,
            title,
            timeout,
            research_threshold,
        } => {
            let mut controller = build_controller(storage, args.base_url)?;

            if !controller.preferences().export_enabled()? {
                bail!("the export feature is off; run `excerpo settings --export on` first");
            }

            let (html, source_url) = load_input(&input, timeout, None, args.verbose).await?;
            let category = resolve_category(category.as_deref(), source_url.as_deref())?;

            if args.verbose {
                print_step(1, 3, &format!("Extracting as {}", category.display_name()));
            }
            let config = ExtractConfig { research_char_threshold: research_threshold, ..Default::default() };
            let blocks = controller.clip(&html, category, &config)?;
            print_info(&format!("Extracted {} block(s)", blocks.len()));

            if !controller.client().is_paired().await {
                run_pairing(&mut controller).await?;
            }

            apply_overrides(&controller, category, space, type_id, template, &tags)?;

            if args.verbose {
                print_step(2, 3, "Resolving destination");
            }
            let destination = controller.resolve_destination(category).await.map_err(guided)?;

            if args.verbose {
                print_step(3, 3, "Creating objects");
            }
            let report = controller
                .export_batch(&blocks, &destination, title.as_deref())
                .await
                .map_err(guided)?;

            for (index, message) in &report.failures {
                print_error(&format!("Block {} failed: {}", index + 1, message));
            }
            if report.is_complete() {
                print_success(&report.to_string());
            } else {
                print_warning(&report.to_string());
            }
        }

        Command::Settings { export } => {
            let preferences = PreferenceStore::new(storage);
            match export.as_deref() {
                Some("on") | Some("true") => {
                    preferences.set_export_enabled(true)?;
                    print_success("Export feature is on");
                }
                Some("off") | Some("false") => {
                    preferences.set_export_enabled(false)?;
                    print_success("Export feature is off");
                }
                Some(other) => bail!("expected `on` or `off`, got `{}`", other),
                None => {
                    let enabled = preferences.export_enabled()?;
                    println!("export: {}", if enabled { "on" } else { "off" });
                }
            }
        }
    }

    Ok(())
}

fn build_controller(storage: Storage, base_url: Option<String>) -> anyhow::Result<ExportController> {
    let credentials = CredentialStore::new(storage.clone());
    let client = match base_url {
        Some(url) => AnytypeClient::with_base_url(credentials, url)?,
        None => AnytypeClient::new(credentials)?,
    };
    Ok(ExportController::new(client, PreferenceStore::new(storage)))
}

async fn load_input(
    input: &str,
    timeout: u64,
    user_agent: Option<String>,
    verbose: bool,
) -> anyhow::Result<(String, Option<String>)> {
    if input == "-" {
        if verbose {
            print_info("Reading from stdin");
        }
        Ok((fetch_stdin()?, None))
    } else if input.starts_with("http://") || input.starts_with("https://") {
        if verbose {
            print_info(&format!("Fetching from {}", input.bright_white().underline()));
        }
        let config = FetchConfig {
            timeout,
            user_agent: user_agent.unwrap_or_else(|| FetchConfig::default().user_agent),
        };
        let html = fetch_url(input, &config).await.context("Failed to fetch URL")?;
        Ok((html, Some(input.to_string())))
    } else {
        if verbose {
            print_info(&format!("Reading from file {}", input.bright_white()));
        }
        Ok((fetch_file(input)?, None))
    }
}

fn resolve_category(key: Option<&str>, source_url: Option<&str>) -> anyhow::Result<Category> {
    if let Some(key) = key {
        return Category::from_key(key).ok_or_else(|| {
            anyhow!(
                "unknown category `{}`; expected one of: {}",
                key,
                Category::ALL.iter().map(|c| c.key()).collect::<Vec<_>>().join(", ")
            )
        });
    }

    Ok(match source_url {
        Some(url) => Category::for_url(url),
        None => Category::ALL[0],
    })
}

fn join_blocks(blocks: &[excerpo_core::ContentBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn apply_overrides(
    controller: &ExportController,
    category: Category,
    space: Option<String>,
    type_id: Option<String>,
    template: Option<String>,
    tags: &[String],
) -> anyhow::Result<()> {
    if space.is_none() && type_id.is_none() && template.is_none() && tags.is_empty() {
        return Ok(());
    }

    let mut selection = controller.preferences().get(category)?.unwrap_or_default();
    if space.is_some() {
        selection.space_id = space;
    }
    if type_id.is_some() {
        selection.type_id = type_id;
    }
    if template.is_some() {
        selection.template_id = template;
    }
    if !tags.is_empty() {
        selection.tag_ids = tags.iter().cloned().collect();
    }

    controller.preferences().set(category, &selection)?;
    Ok(())
}

async fn run_pairing(controller: &mut ExportController) -> anyhow::Result<()> {
    if !controller.client().check_health().await {
        bail!("the knowledge-base application is not reachable; start it and retry");
    }

    controller.begin_pairing().await.map_err(guided)?;
    print_info("Enter the 4-digit code shown by the application:");

    let mut code = String::new();
    std::io::stdout().flush()?;
    std::io::stdin().read_line(&mut code)?;

    match controller.finish_pairing(code.trim()).await {
        Ok(()) => {
            print_success("Paired");
            Ok(())
        }
        Err(err) => {
            controller.cancel_pairing();
            Err(guided(err))
        }
    }
}

/// Converts the distinguished unauthorized kind into a guided retry hint;
/// everything else passes through.
fn guided(err: ExcerpoError) -> anyhow::Error {
    match err {
        ExcerpoError::Unauthorized => {
            anyhow!("the stored pairing is no longer valid; run `excerpo pair` and retry")
        }
        other => anyhow!(other),
    }
}
