use clap::Parser;
use std::sync::Arc;
use tally::channels::{run_console, ConsoleTransport};
use tally::cli::{self, Cli, Command, ConfigCommand};
use tally::config::Config;
use tally::polls::{create_engine, ChatId, DraftStore, PollService, UserId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    let config_path = args.config.as_deref();

    match args.command {
        Some(Command::Config(ConfigCommand::Show)) => cli::handle_config_show(config_path),
        Some(Command::Config(ConfigCommand::Path)) => {
            cli::handle_config_path(config_path);
            Ok(())
        }
        Some(Command::Version) => {
            cli::handle_version();
            Ok(())
        }
        Some(Command::Start { user, chat }) => {
            let config = cli::load(config_path)?;
            start(config, user, chat).await
        }
        None => {
            let config = cli::load(config_path)?;
            start(config, None, None).await
        }
    }
}

async fn start(
    config: Config,
    user: Option<String>,
    chat: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    tally::logging::init_logging(&config.logging)?;

    let service = PollService::new(
        create_engine(),
        DraftStore::new(config.polls.max_options),
        Arc::new(ConsoleTransport::stdout()),
    );
    let user = UserId::from(user.unwrap_or(config.console.user_id));
    let chat = ChatId::from(chat.unwrap_or(config.console.chat_id));

    run_console(&service, user, chat).await
}
