pub mod config;
pub mod controller;
pub mod grbl;
pub mod mapping;
pub mod shutdown;

use crate::config::AppConfig;
use crate::controller::controller_handle::{ControllerHandle, GilrsDevice};
use crate::grbl::{ProtocolClient, SerialLink, STATUS_PROBE};
use crate::mapping::Dispatcher;
use crate::shutdown::ShutdownCoordinator;
use color_eyre::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let mut config = AppConfig::load().await?;
    config.apply_args(std::env::args().skip(1));
    config.validate()?;

    // Serial link first; nothing works without the controller
    let link = SerialLink::open(&config.serial)?;
    let client = ProtocolClient::new(link.clone());

    let probe_client = client.clone();
    match tokio::task::spawn_blocking(move || probe_client.send(STATUS_PROBE)).await? {
        Ok(response) if response.is_empty() => warn!("Controller sent no status reply"),
        Ok(response) => info!("Controller status: {}", response),
        Err(e) => warn!("Status probe failed: {}", e),
    }

    let device = GilrsDevice::open(&config.joystick)?;

    let token = CancellationToken::new();
    // Single slot: the sampler waits while a command is being exchanged
    let (event_sender, event_receiver) = mpsc::channel(1);

    info!("Starting input pipeline");
    let controller = ControllerHandle::spawn(device, &config.joystick, event_sender, token.clone());
    let _dispatcher_handle = Dispatcher::new(client).spawn(event_receiver);
    let coordinator = ShutdownCoordinator::create(link.clone(), token);

    tokio::select! {
        result = coordinator.run(tokio::signal::ctrl_c()) => {
            let terminated = result?;
            // Blocking stages may still be parked on the device or the port
            std::process::exit(terminated.exit_code());
        }
        result = controller.finished() => {
            let stats = result?;
            info!(
                "Input pipeline ended: {} samples, {} forwarded",
                stats.sampled, stats.forwarded
            );
            tokio::task::spawn_blocking(move || link.close()).await?;
        }
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
