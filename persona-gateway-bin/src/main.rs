//! Personal-website chatbot server - answers visitors in the persona's
//! voice, grounded in a fixed set of personal documents.

#![deny(missing_docs)]

use conf::Conf;
use hyper::service::service_fn;
use hyper_util::{rt::TokioIo, server::conn::auto};
use persona_gateway::{
    CompletionConfig, Persona, PersonaConfig, PushoverConfig, PushoverNotifier, Responder,
    verify_registry,
};
use std::{env, fs, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use persona_gateway_bin::service::{ChatService, CorsPolicy};

/// Top-level configuration for the chatbot server.
#[derive(Conf, Debug)]
#[conf(serde)]
pub struct Config {
    /// Path to a TOML config file (optional).
    /// This is parsed before other args, so config file values can be overridden by CLI args.
    #[allow(dead_code)] // Parsed early via find_parameter, kept here for --help
    #[conf(long)]
    config_file: Option<PathBuf>,
    /// If true, just validate config and don't start
    #[conf(long)]
    dry_run: bool,
    /// Socket to listen for HTTP requests
    #[conf(long, env, default_value = "0.0.0.0:7860")]
    http_listen_addr: SocketAddr,
    /// Comma-separated CORS allow-list; "*" allows all origins.
    #[conf(long, env, default_value = "*")]
    allowed_origins: String,
    /// Production mode: disables debug behavior such as config dumps.
    #[conf(long, env)]
    production: bool,
    /// Optional secret for signing session cookies.
    #[conf(long, env)]
    session_secret: Option<String>,
    /// Path to the profile image served to the chat widget.
    #[conf(long, env, default_value = "assets/profile.png")]
    profile_image: PathBuf,
    #[conf(flatten, serde(flatten))]
    persona: PersonaConfig,
    #[conf(flatten, serde(flatten))]
    completion: CompletionConfig,
    #[conf(flatten, serde(flatten))]
    pushover: PushoverConfig,
}

fn init_logging() {
    // Build a default tracing subscriber, writing to STDERR
    // Uses RUST_LOG env var for filtering, defaults to "info" if not set
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // load dotenv file
    match dotenvy::dotenv() {
        Ok(path) => info!("Read dotenv file from: {}", path.display()),
        Err(dotenvy::Error::Io(io_error)) => {
            if matches!(io_error.kind(), std::io::ErrorKind::NotFound) {
                info!("Couldn't find a dotenv file");
            } else {
                panic!("Io error when reading dot env file: {io_error}")
            }
        }
        Err(err) => {
            panic!("Error reading dotenv file: {err}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Check for --config-file before the main parse, so we can load it and pass to conf
    let config_file_path = conf::find_parameter("config-file", env::args_os());

    let config = if let Some(config_path) = config_file_path {
        let path_display = config_path.to_string_lossy();
        let file_contents = fs::read_to_string(&config_path)
            .map_err(|err| format!("Could not open config file '{path_display}': {err}"))?;
        let doc: toml::Value = toml::from_str(&file_contents)
            .map_err(|err| format!("Config file '{path_display}' is not valid TOML: {err}"))?;
        info!("Loaded config file: {path_display}");
        Config::conf_builder().doc(path_display, doc).parse()
    } else {
        Config::parse()
    };

    if config.production {
        if config.session_secret.is_none() {
            warn!("No session secret configured. Set SESSION_SECRET in production!");
        }
    } else {
        info!("Config = {config:#?}");
    }

    if config.dry_run {
        return Ok(());
    }

    // The persona and tool registry are process-wide immutable state; a
    // missing grounding document or a diverging tool registry is fatal.
    let persona = Arc::new(Persona::load(&config.persona)?);
    info!("Loaded persona for {}", persona.name());

    let notifier = Arc::new(PushoverNotifier::new(&config.pushover)?);
    verify_registry(notifier.as_ref())?;

    let responder = Responder::new(config.completion.clone(), persona.clone(), notifier)?;
    let chat_service = Arc::new(ChatService::new(
        responder,
        persona,
        CorsPolicy::parse(&config.allowed_origins),
        config.profile_image.clone(),
    ));

    let token = CancellationToken::new();

    let listener = TcpListener::bind(config.http_listen_addr).await?;
    info!("Listening for http on {}", config.http_listen_addr);

    // Listen for ctrl-c
    let thread_token = token.clone();
    tokio::task::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        warn!("ctrl-c: Stop requested");
        thread_token.cancel();
    });

    let _http_task = start_http_task(listener, chat_service);

    token.cancelled().await;

    Ok(())
}

fn start_http_task(
    listener: TcpListener,
    chat_service: Arc<ChatService>,
) -> tokio::task::JoinHandle<()> {
    // Loop waiting for http incoming connections, and pass them to the service
    tokio::task::spawn(async move {
        loop {
            let Ok((stream, remote_addr)) = listener
                .accept()
                .await
                .inspect_err(|err| error!("Error accepting connection: {err}"))
            else {
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            };
            info!("New connection from: {}", remote_addr);

            // Spawn a new task to handle each connection
            let thread_service = chat_service.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                // Serve the connection using auto protocol detection (HTTP/1 or HTTP/2)
                if let Err(err) = auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                    .serve_connection(
                        io,
                        service_fn(|req| {
                            let thread_service = thread_service.clone();
                            async move {
                                Ok::<_, std::convert::Infallible>(
                                    thread_service.handle_request(req).await,
                                )
                            }
                        }),
                    )
                    .await
                {
                    error!("Error serving connection: {err}");
                }
            });
        }
    })
}
