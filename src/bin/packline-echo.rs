use std::path::{Path, PathBuf};

use clap::Parser;
use dotenv::dotenv;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};
use tracing_subscriber::fmt::time::ChronoLocal;

use packline::{
    Channel, ChannelError, ChannelOptions, ChannelResult, TerminatorEncoder, TerminatorFilter,
};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// listen address override
    #[arg(short, long)]
    pub listen: Option<String>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Deserialize)]
pub struct EchoConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_buffer_size")]
    pub receive_buffer_size: usize,
    #[serde(default)]
    pub max_package_length: usize,
}

fn default_listen() -> String {
    "127.0.0.1:7070".to_string()
}

fn default_buffer_size() -> usize {
    packline::DEFAULT_BUFFER_SIZE
}

pub static GLOBAL_CONFIG: OnceCell<EchoConfig> = OnceCell::new();

fn global_config() -> &'static EchoConfig {
    GLOBAL_CONFIG.get().unwrap()
}

fn main() {
    if let Err(e) = run() {
        error!("packline-echo start failed: {}", e);
        eprintln!("packline-echo start failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> ChannelResult<()> {
    let commandline: CommandLine = CommandLine::parse();
    dotenv().ok();
    setup_tracing(commandline.verbose);

    // setup config
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let mut config = load_config(&config_path)?;
    if let Some(listen) = commandline.listen {
        config.listen = listen;
    }
    GLOBAL_CONFIG.set(config).expect("set echo config failed");

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(serve())
}

fn setup_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_timer(timer)
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("set tracing subscriber failed");
}

fn load_config(path: &Path) -> ChannelResult<EchoConfig> {
    config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .build()
        .and_then(|c| c.try_deserialize::<EchoConfig>())
        .map_err(|e| ChannelError::InvalidValue("config", e.to_string()))
}

async fn serve() -> ChannelResult<()> {
    let listen = &global_config().listen;
    let listener = TcpListener::bind(listen).await?;
    info!("packline-echo listening on {}", listen);
    loop {
        let socket = accept(&listener).await?;
        tokio::spawn(async move {
            if let Err(e) = echo_connection(socket).await {
                error!("connection error: {:?}", e);
            }
        });
    }
}

/// Accept with exponential backoff; transient errors are retried until the
/// backoff cap is reached.
async fn accept(listener: &TcpListener) -> ChannelResult<TcpStream> {
    let mut backoff = 1;

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                debug!("accept new connection from {}", peer);
                return Ok(socket);
            }
            Err(e) => {
                if backoff > 64 {
                    return Err(e.into());
                }
            }
        }

        time::sleep(Duration::from_secs(backoff)).await;
        backoff *= 2;
    }
}

/// Parse newline-terminated packages and send each one straight back.
async fn echo_connection(socket: TcpStream) -> ChannelResult<()> {
    let config = global_config();
    let options = ChannelOptions::new()
        .with_receive_buffer_size(config.receive_buffer_size)
        .with_max_package_length(config.max_package_length);

    let channel = Channel::new(socket, TerminatorFilter::lines(), (), options)?;
    let handle = channel.handle();
    let mut packages = channel.run();

    let encoder = TerminatorEncoder::lines();
    while let Some(line) = packages.next().await {
        handle.send_encoded(&encoder, &line).await?;
    }
    Ok(())
}
