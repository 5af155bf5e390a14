use clap::{Parser, Subcommand};
use lib::bot::{BotClient, BotQuery, ResponseMode};
use lib::markdown::render_markdown;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "mva")]
#[command(about = "Virtual assistant CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: MVA_CONFIG_PATH or ~/.mva/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway: serves the chat widget and forwards messages to the bot.
    Gateway {
        /// Config file path (default: MVA_CONFIG_PATH or ~/.mva/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one message to the bot and print the answer.
    Ask {
        /// Message text.
        message: String,

        /// Config file path (default: MVA_CONFIG_PATH or ~/.mva/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// "blocking" or "streaming" (default from config).
        #[arg(long, value_name = "MODE")]
        mode: Option<ResponseMode>,

        /// Continue an existing conversation.
        #[arg(long, value_name = "ID")]
        conversation_id: Option<String>,

        /// Message this one replies to.
        #[arg(long, value_name = "ID")]
        parent_message_id: Option<String>,

        /// Print sanitized HTML instead of the raw answer.
        #[arg(long)]
        html: bool,

        /// Print the full bot response as JSON.
        #[arg(long, conflicts_with = "html")]
        json: bool,
    },

    /// Chat with the bot interactively; the conversation id is carried between turns.
    Chat {
        /// Config file path (default: MVA_CONFIG_PATH or ~/.mva/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Optional existing conversation id to continue.
        #[arg(long, value_name = "ID")]
        conversation_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("mva {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            message,
            config,
            mode,
            conversation_id,
            parent_message_id,
            html,
            json,
        }) => {
            let query = BotQuery::new(message)
                .conversation_id(conversation_id)
                .parent_message_id(parent_message_id);
            let query = match mode {
                Some(m) => query.response_mode(m),
                None => query,
            };
            let output = if json {
                AskOutput::Json
            } else if html {
                AskOutput::Html
            } else {
                AskOutput::Raw
            };
            if let Err(e) = run_ask(config, query, output).await {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            conversation_id,
        }) => {
            if let Err(e) = run_chat(config, conversation_id).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config).await
}

fn bot_client(config_path: Option<std::path::PathBuf>) -> anyhow::Result<BotClient> {
    let (config, _) = lib::config::load_config(config_path)?;
    BotClient::from_config(&config.bot)
}

/// Token cancelled on the first Ctrl+C, so an in-flight request can be abandoned.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

enum AskOutput {
    Raw,
    Html,
    Json,
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    query: BotQuery,
    output: AskOutput,
) -> anyhow::Result<()> {
    let client = bot_client(config_path)?;
    let cancel = ctrl_c_token();
    let res = client.send_query_cancellable(query, &cancel).await?;
    match output {
        AskOutput::Raw => println!("{}", res.answer),
        AskOutput::Html => println!("{}", render_markdown(&res.answer)),
        AskOutput::Json => println!("{}", serde_json::to_string_pretty(&res)?),
    }
    Ok(())
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    conversation_id: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let client = bot_client(config_path)?;
    let mut conversation = conversation_id;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("< {}", lib::chat::GREETING);
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        match client.send(input, conversation.as_deref(), None).await {
            Ok(res) => {
                if let Some(id) = res.conversation_id_text() {
                    conversation = Some(id);
                }
                println!("< {}", res.answer.trim());
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}
