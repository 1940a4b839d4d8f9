use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use myrecipe_client::api::credentials::{CredentialStore, KeyringStore, MemoryStore};
use myrecipe_client::api::types::ItemRequest;
use myrecipe_client::commands;
use myrecipe_client::config::Config;
use myrecipe_client::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "myrecipe", about = "MyRecipe API client")]
struct Cli {
    /// API base URL (overrides MYRECIPE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds, also used for token refresh
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Keep tokens in memory only instead of the OS keychain
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        nickname: String,
    },
    /// Revoke the session and clear stored tokens
    Logout,
    /// Show whether a session is stored
    Status,
    /// Refrigerator inventory
    #[command(subcommand)]
    Fridge(FridgeCommand),
}

#[derive(Subcommand, Debug)]
enum FridgeCommand {
    /// List items
    List,
    /// Add an item
    Add(ItemArgs),
    /// Update an item
    Update {
        id: i64,
        #[command(flatten)]
        item: ItemArgs,
    },
    /// Delete an item
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct ItemArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    unit: String,
    /// Expiration date (YYYY-MM-DD)
    #[arg(long)]
    expires: String,
    #[arg(long)]
    quantity: Option<u32>,
}

impl From<ItemArgs> for ItemRequest {
    fn from(args: ItemArgs) -> Self {
        ItemRequest {
            name: args.name,
            quantity: args.quantity,
            unit: args.unit,
            expiration_date: args.expires,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();

    env_logger::init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(secs) = cli.timeout_secs.filter(|s| *s > 0) {
        config.timeout = Duration::from_secs(secs);
    }
    log::info!("Using API at {}", config.api_base_url);

    let store: Arc<dyn CredentialStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(KeyringStore::with_service(&config.keychain_service))
    };
    let state = match AppState::new(&config, store) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to create HTTP client: {}", e);
            eprintln!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Login { email, password } => commands::login(&state, &email, &password).await,
        Command::Signup {
            email,
            password,
            nickname,
        } => commands::signup(&state, &email, &password, &nickname).await,
        Command::Logout => commands::logout(&state).await,
        Command::Status => {
            commands::status(&state);
            Ok(())
        }
        Command::Fridge(FridgeCommand::List) => commands::fridge_list(&state).await,
        Command::Fridge(FridgeCommand::Add(item)) => {
            commands::fridge_add(&state, &item.into()).await
        }
        Command::Fridge(FridgeCommand::Update { id, item }) => {
            commands::fridge_update(&state, id, &item.into()).await
        }
        Command::Fridge(FridgeCommand::Delete { id }) => {
            commands::fridge_delete(&state, id).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_session_expired() => {
            log::debug!("{}", e);
            eprintln!("Your session has expired. Please log in again.");
            ExitCode::from(2)
        }
        Err(e) => {
            log::debug!("{}", e);
            eprintln!("{}", e.user_message("Request failed."));
            ExitCode::FAILURE
        }
    }
}
