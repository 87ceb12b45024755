use anyhow::anyhow;
use chat_relay::io_struct::ChatModel;
use chat_relay::relay_state::{RelayConfig, RelayState};
use chat_relay::server;
use chat_relay::session::ChatSession;
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, Write};

#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(about = "Streaming chat relay for OpenAI-compatible completion APIs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve(ServeArgs),
    /// Interactive chat against a running relay
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind the relay server
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the relay server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the upstream completion API
    #[arg(long, default_value = "https://api.openai.com/v1")]
    upstream_url: String,

    /// Environment variable holding the upstream API credential
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout: u64,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Base URL of the relay server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    relay_url: String,

    /// Model to chat with
    #[arg(long)]
    model: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let config = RelayConfig {
                host: args.host,
                port: args.port,
                upstream_url: args.upstream_url,
                api_key_env: args.api_key_env,
                timeout: args.timeout,
            };
            let state = RelayState::new(&config)?;
            actix_web::rt::System::new().block_on(server::startup(config, state))?;
            Ok(())
        }
        Command::Chat(args) => {
            env_logger::init();
            actix_web::rt::System::new().block_on(run_chat(args))
        }
    }
}

async fn run_chat(args: ChatArgs) -> anyhow::Result<()> {
    let mut session = ChatSession::new(args.relay_url);
    if let Some(model) = args.model {
        let model =
            ChatModel::parse(&model).ok_or_else(|| anyhow!("unknown model: {}", model))?;
        session.store_mut().set_model(model);
    }

    println!(
        "Chatting with {}. Commands: /model <id>, /models, /clear, /quit",
        session.store().model().as_str()
    );

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.store_mut().clear();
                println!("Conversation cleared.");
            }
            "/models" => {
                for model in ChatModel::ALL {
                    println!("{} - {}", model.as_str(), model.label());
                }
            }
            _ if line.starts_with("/model") => {
                match line.split_whitespace().nth(1).and_then(ChatModel::parse) {
                    Some(model) => {
                        session.store_mut().set_model(model);
                        println!("Model set to {}.", model.as_str());
                    }
                    None => println!("Unknown model. Use /models to list the options."),
                }
            }
            prompt => {
                let result = session
                    .submit_with(prompt, |delta| {
                        print!("{}", delta);
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                match result {
                    Ok(()) => println!(),
                    Err(err) => eprintln!("\nError: {}", err),
                }
            }
        }
    }
    Ok(())
}
