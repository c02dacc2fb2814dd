//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gemchat_core::{config, interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(version)]
#[command(about = "Chat with Gemini from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Format a model reply as HTML markup
    Format {
        /// File to read (default: stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Print how each line is classified instead of the markup
        #[arg(long)]
        explain: bool,
    },

    /// Ask a single question and print the formatted reply
    Ask {
        /// The question to send
        #[arg(short, long)]
        prompt: String,

        /// Print the reply text without formatting
        #[arg(long)]
        raw: bool,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start an interactive chat (requires sign-in)
    Chat {
        /// Write an HTML transcript of the conversation on exit
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,

        /// Stream reply text as it arrives instead of printing formatted markup
        #[arg(long)]
        raw: bool,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage the signed-in account
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Check that the Gemini API key works
    TestConnection,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum AuthCommands {
    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign in with a Google id token
    Google {
        /// Id token issued by Google for this project
        #[arg(long, env = "GEMCHAT_GOOGLE_ID_TOKEN", hide_env_values = true)]
        id_token: String,
    },
    /// Sign out and forget stored credentials
    Signout,
    /// Send a password reset email
    Reset {
        #[arg(long)]
        email: Option<String>,
    },
    /// Show who is signed in
    Status,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // load dotenv file; keys can also come from the environment or config
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(io_error)) if io_error.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).context("read .env file"),
    }

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config.logging);

    match cli.command {
        Commands::Format { file, explain } => commands::format::run(file.as_deref(), explain),

        Commands::Ask { prompt, raw, model } => {
            commands::ask::run(&prompt, raw, model.as_deref(), &config).await
        }

        Commands::Chat {
            transcript,
            raw,
            model,
        } => commands::chat::run(&config, model.as_deref(), transcript.as_deref(), raw).await,

        Commands::Auth { command } => match command {
            AuthCommands::Signup { name, email } => {
                commands::auth::signup(&config, name, email).await
            }
            AuthCommands::Signin { email } => commands::auth::signin(&config, email).await,
            AuthCommands::Google { id_token } => commands::auth::google(&config, &id_token).await,
            AuthCommands::Signout => commands::auth::signout(&config),
            AuthCommands::Reset { email } => commands::auth::reset(&config, email).await,
            AuthCommands::Status => commands::auth::status(&config),
        },

        Commands::TestConnection => commands::connection::run(&config).await,

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
