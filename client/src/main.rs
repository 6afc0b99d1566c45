use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use zsm_client::{ClientSession, LineUi, LocalKeyDirectory, LoggingNotifier, SqliteStore, Store, Ui};
use zsm_common::logging;
use zsm_crypto::IdentityKeys;

/// `zen` — the zsm client daemon (§6 "Client CLI").
#[derive(Parser)]
#[command(name = "zen")]
struct Cli {
    /// Alternate config file path, overriding `~/.local/share/zsm/zen/zen.conf`.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generates a fresh identity keypair and prints it in config-file form.
    CreateKey,
    /// Copies the local message store to `<name>.db` via `VACUUM INTO`.
    CreateBackup { name: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Command::CreateKey) => create_key(),
        Some(Command::CreateBackup { name }) => create_backup(name),
        None => run(cli.config),
    }
}

fn create_key() -> anyhow::Result<()> {
    let keys = IdentityKeys::generate();
    println!("public_key={}", keys.identity().to_hex());
    println!("private_key={}", hex::encode(keys.to_expanded_secret()));
    Ok(())
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    Ok(zsm_common::app_data_dir("zen")?.join("zen.db"))
}

fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(zsm_common::app_data_dir("zen")?.join("zen.conf"))
}

fn create_backup(name: &str) -> anyhow::Result<()> {
    let db_path = default_db_path().context("resolving the local store path")?;
    let store = SqliteStore::open(&db_path).context("opening the local store")?;
    let backup_path = PathBuf::from(format!("{name}.db"));
    store.backup_to(&backup_path).context("writing the backup")?;
    println!("backup written to {}", backup_path.display());
    Ok(())
}

fn run(config_override: Option<PathBuf>) -> anyhow::Result<()> {
    let log_path = zsm_common::app_data_dir("zen")?.join("zen.log");
    let logger = logging::file_logger(&log_path).context("opening zen.log")?;

    let config_path = match config_override {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = zsm_client::load_config(&config_path, &logger)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let db_path = default_db_path()?;
    let store = Arc::new(SqliteStore::open(&db_path).context("opening the local store")?);

    let session = ClientSession::connect(config.keys, &config.server_address, Arc::clone(&store), logger.clone())
        .with_context(|| format!("connecting to {}", config.server_address))?;

    let directory = LocalKeyDirectory::new(Arc::clone(&store));
    let notifier = Arc::new(LoggingNotifier::new(logger.clone()));
    let ui: Arc<Mutex<LineUi>> = Arc::new(Mutex::new(LineUi::new()));
    let selected = Arc::new(Mutex::new(None));

    let _receive_handle = session
        .spawn_receive_task(Arc::clone(&notifier), Arc::clone(&ui), Arc::clone(&selected))
        .context("spawning the receive task")?;

    ui.lock().expect("ui mutex poisoned").set_status(&format!("connected as {}", session.identity()));

    // A dedicated stdin-reading thread keeps the blocking terminal read off
    // the shared UI mutex, so the receive task can still render incoming
    // messages while the operator is mid-line (§5 thread layout). It owns a
    // private `LineUi` purely to drive `read_command`, the one real front
    // end for parsed input; `ui` above stays reserved for rendering output.
    let (commands_tx, commands_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut input_ui = LineUi::new();
        loop {
            match input_ui.read_command() {
                Some(command) => {
                    if commands_tx.send(Some(command)).is_err() {
                        return;
                    }
                }
                None => {
                    let _ = commands_tx.send(None);
                    return;
                }
            }
        }
    });

    let mut session = session;
    for command in commands_rx {
        let Some(command) = command else { break };

        let recipient = {
            let mut ui_guard = ui.lock().expect("ui mutex poisoned");
            match session.resolve(&directory, &command.target, &mut *ui_guard) {
                Some(recipient) => recipient,
                None => continue,
            }
        };

        *selected.lock().expect("selected-peer mutex poisoned") = Some(recipient);
        ui.lock().expect("ui mutex poisoned").select_conversation(&recipient);

        let mut ui_guard = ui.lock().expect("ui mutex poisoned");
        session.send(recipient, &command.text, &mut *ui_guard)?;
    }

    Ok(())
}
