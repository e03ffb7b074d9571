//! commitgpt - generate commit messages from your pending changes.
//!
//! Reads the git diff, asks a language model for a Conventional Commits
//! message and either prints it or, in interactive mode, proposes the git
//! commands and runs them once confirmed.

mod config;
mod git;
mod llm;
mod prompt;
mod runner;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use git::GitRepo;
use llm::CompletionClient;
use prompt::PromptBuilder;
use runner::InteractiveRunner;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const API_KEYS_URL: &str = "https://platform.openai.com/api-keys";

#[derive(Parser)]
#[command(name = "commitgpt")]
#[command(author, version, about = "Generate a commit message from the changes in your git diff")]
#[command(long_about = "Generates a commit message from the changes in the git diff, following \
the Conventional Commits standard.\n\nRecommended usage: git commit -m \"$(commitgpt)\"")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Extra instructions for the model, e.g. "commit this as work in progress"
    #[arg(value_name = "PROMPT")]
    prompt: Vec<String>,

    /// Override the configured model
    #[arg(short = 'm', long, value_name = "MODEL", global = true)]
    model: Option<String>,

    /// Log debug output to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store your OpenAI API key and an optional custom prompt
    #[command(short_flag = 'a', long_flag = "auth")]
    Auth,
    /// Propose the git commands for this change and run them after confirmation [y/n/r]
    #[command(short_flag = 'i', long_flag = "interactive")]
    Interactive {
        /// Extra instructions for the model
        #[arg(value_name = "PROMPT")]
        prompt: Vec<String>,
    },
    /// Show the version of commitgpt
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Auth) => handle_auth(),
        Some(Commands::Interactive { prompt }) => {
            handle_interactive(&prompt, cli.model.as_deref()).await
        }
        Some(Commands::Version) => {
            println!("commitgpt version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => handle_generate(&cli.prompt, cli.model.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the result.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "commitgpt=debug,reqwest=warn"
    } else {
        "commitgpt=warn,reqwest=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Everything a generation needs: the diff, the prompt builder and a client.
struct Session {
    repo: GitRepo,
    diff: String,
    builder: PromptBuilder,
    client: llm::OpenAIClient,
}

impl Session {
    fn open(model_override: Option<&str>) -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let client = llm::create_client(&config, model_override)?;

        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let repo = GitRepo::discover(&cwd)?;
        let diff = repo.diff()?;

        let builder = PromptBuilder::new(config.instruction(), config.model.max_diff_chars);
        info!("Using model {}", client.model());

        Ok(Self {
            repo,
            diff,
            builder,
            client,
        })
    }
}

/// Default mode: print the commit message only.
async fn handle_generate(user_text: &[String], model_override: Option<&str>) -> Result<()> {
    let session = Session::open(model_override)?;
    let prompt = session.builder.commit_message(&session.diff, user_text);

    let response = session.client.complete(&prompt).await?;
    let message = llm::commit_message_from(&response);
    debug!("Generated message: {}", message);

    println!("{}", message);
    Ok(())
}

/// Interactive mode: confirm, retry or abort, then run the commands.
async fn handle_interactive(user_text: &[String], model_override: Option<&str>) -> Result<()> {
    if !atty::is(atty::Stream::Stdin) {
        debug!("stdin is not a terminal, reading the confirmation from it anyway");
    }

    let session = Session::open(model_override)?;
    let prompt = session.builder.commands(&session.diff, user_text);
    let runner = InteractiveRunner::new(&session.client, session.repo.root());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let result = runner.run(&prompt, &mut input, &mut output).await?;

    print!("{}", result);
    output.flush()?;
    Ok(())
}

/// Store the API key and custom prompt.
fn handle_auth() -> Result<()> {
    println!("Create an API key at:");
    println!("  {}\n", API_KEYS_URL);

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let api_key = ask(&mut input, "Paste your API Key here: ")?;
    if api_key.is_empty() {
        bail!("No API key entered");
    }
    let custom = ask(
        &mut input,
        "Would you like to add a custom prompt? (Leave blank for the default) ",
    )?;

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Replacing unreadable configuration: {:#}", e);
            Config::default()
        }
    };
    config.api_key.key = Some(api_key);
    config.prompt.custom = Some(config::compose_custom_prompt(&custom));
    let path = config.save()?;

    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn ask<R: BufRead>(input: &mut R, question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("An error occurred while reading input. Please try again")?;
    Ok(line.trim().to_string())
}
