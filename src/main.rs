use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};

use medihub_chat::app::Settings;
use medihub_chat::ui::{login, main_window};
use medihub_chat::utils::RUNTIME;

#[derive(Parser, Debug)]
#[command(name = "medihub-chat", about = "Chat with your MediHub doctors from the terminal")]
struct Args {
    /// Settings file (defaults to medihub.toml in the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ask for connection settings even if they are already saved
    #[arg(long)]
    login: bool,

    /// Open a single conversation with this doctor id
    #[arg(long)]
    doctor: Option<String>,

    /// Do not connect to the realtime server
    #[arg(long)]
    offline: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = RUNTIME.block_on(async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut settings = Settings::load(args.config.as_deref());
        if args.login || !settings.is_complete() {
            settings = login::login(&mut lines, &settings, args.config.as_deref()).await?;
        }
        let options = main_window::RunOptions { doctor: args.doctor, offline: args.offline };
        main_window::run(settings, options, &mut lines).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
