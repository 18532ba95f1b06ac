use std::net::SocketAddr;

use aide::axum::ApiRouter;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use thoughtbox::{
    app::{self, AppParams},
    config::{self, Config},
    crypto::FieldCipher,
    errors::{Error, Result},
    init_db, notes, telemetry,
    users::{self, CreateUserParameters},
};

#[derive(Parser)]
#[command(name = "thoughtbox", version, about = "Encrypted notes server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user and print its bearer token
    CreateUser {
        #[arg(long)]
        email: String,
    },
    /// Encrypt note rows that were stored before encryption was enabled
    EncryptNotes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init()?;

    telemetry::setup_tracing(config.log_json);

    let cipher = cipher(config)?;
    let db = init_db(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, cipher).await,
        Command::CreateUser { email } => {
            let (user, token) = users::create_user(&db, CreateUserParameters { email }).await?;
            tracing::info!(user_id = %user.id, "user created");
            println!("{token}");
            Ok(())
        }
        Command::EncryptNotes => {
            let report = notes::migrate::encrypt_legacy_notes(&db, cipher).await?;
            println!(
                "migrated: {}, skipped: {}, failed: {}",
                report.migrated, report.skipped, report.failed
            );
            Ok(())
        }
    }
}

fn cipher(config: &Config) -> Result<FieldCipher> {
    config
        .encryption_secret()
        .map(FieldCipher::new)
        .ok_or_else(|| Error::Config("ENCRYPTION_KEY must be set in production".into()))
}

async fn serve(config: &Config, db: thoughtbox::DB, cipher: FieldCipher) -> Result<()> {
    let (app, _) = app::create(AppParams {
        db,
        cipher,
        router: |state| ApiRouter::new().merge(notes::router(state)),
    })
    .await?;

    let app = telemetry::add_tracing_layer(app).layer(app::cors_layer(config.cors_origin.as_deref())?);

    let host = if config.is_development() { "127.0.0.1" } else { "0.0.0.0" };
    let listener = TcpListener::bind(format!("{host}:{}", config.port)).await?;

    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
