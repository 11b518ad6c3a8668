use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use wallet_payload_sync::EngineConfig;
use wallet_payload_sync::backend::WalletBackendClient;
use wallet_payload_sync::upgrade::{EntropyService, OsEntropy, default_upgrader};
use wallet_payload_sync::wallet::sync::events::TracingEventHandler;
use wallet_payload_sync::wallet::sync::pubkeys::Bip84LookaheadProvider;
use wallet_payload_sync::wallet::{
	InMemoryCredentialsStore, SessionDependencies, WalletCreator, WalletSession,
};

#[derive(Parser)]
#[command(name = "wallet-payload-sync", about = "Upgrade and sync encrypted wallet payloads")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Fetch a wallet, upgrade it to the latest version and save it back if it changed
	FetchUpgrade {
		#[arg(long)]
		guid: String,
		#[arg(long, env = "WALLET_SHARED_KEY")]
		shared_key: String,
		#[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
		password: String,
	},
	/// Create a new wallet, or import one from a recovery phrase
	Create {
		#[arg(long)]
		email: String,
		#[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
		password: String,
		/// Recovery phrase to import instead of generating a new one
		#[arg(long, env = "WALLET_MNEMONIC", hide_env_values = true)]
		mnemonic: Option<String>,
	},
}

#[tokio::main]
async fn main() -> ExitCode {
	dotenvy::dotenv().ok();

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	let cli = Cli::parse();
	let config = EngineConfig::from_env();

	let result = match cli.command {
		Command::FetchUpgrade {
			guid,
			shared_key,
			password,
		} => fetch_upgrade(&config, &guid, &shared_key, &password).await,
		Command::Create {
			email,
			password,
			mnemonic,
		} => create(&config, &email, &password, mnemonic.as_deref()).await,
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

async fn fetch_upgrade(
	config: &EngineConfig,
	guid: &str,
	shared_key: &str,
	password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	info!("Using backend {}", config.backend_url);

	let client = Arc::new(WalletBackendClient::new(
		config.backend_url.clone(),
		config.request_timeout,
	)?);
	let payload = client.fetch_payload(guid, shared_key).await?;

	let entropy = EntropyService::new(Arc::new(OsEntropy), client.clone());
	let upgrader = Arc::new(default_upgrader(entropy, &config.default_account_label));
	let deps = SessionDependencies::new(
		Arc::new(InMemoryCredentialsStore::new()),
		upgrader,
		client,
		Arc::new(Bip84LookaheadProvider::new(config.lookahead)),
	)
	.with_event_handler(Box::new(TracingEventHandler));

	let session = WalletSession::login(deps, payload, password).await?;
	let before = session.wrapper()?.version;
	let after = session.upgrade_and_sync(password).await?;

	if after.version == before {
		info!("Wallet {} is up to date at version {}", after.guid(), after.version);
	} else {
		info!(
			"Wallet {} upgraded from version {} to {} (checksum {})",
			after.guid(),
			before,
			after.version,
			after.payload_checksum
		);
	}

	session.logout().await?;
	Ok(())
}

async fn create(
	config: &EngineConfig,
	email: &str,
	password: &str,
	mnemonic: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
	info!("Using backend {}", config.backend_url);

	let client = Arc::new(WalletBackendClient::new(
		config.backend_url.clone(),
		config.request_timeout,
	)?);
	let creator = WalletCreator::new(
		EntropyService::new(Arc::new(OsEntropy), client.clone()),
		client,
	);

	let account_name = &config.default_account_label;
	let created = match mnemonic {
		Some(phrase) => {
			creator
				.import_wallet(phrase, email, password, account_name, &config.language)
				.await?
		}
		None => {
			creator
				.create_wallet(email, password, account_name, &config.language)
				.await?
		}
	};

	info!("Wallet {} created", created.guid);
	println!("guid: {}", created.guid);
	println!("shared key: {}", created.shared_key);
	Ok(())
}
