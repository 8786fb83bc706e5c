use crate::layer::{AdapterLayer, ControlError, TransactionControl};
use crate::sink::LogSink;
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

pub use tracing::subscriber::SetGlobalDefaultError;

/// Configuration of the adapter bridge.
///
/// **Fields**
/// - `channel_buffer`: maximum number of pending records and commands
///   before new records are dropped.
/// - `max_level`: most verbose level forwarded to the adapter.
/// - `enable_stdout`: if `true`, a `fmt` layer with the same level limit is
///   installed next to the adapter layer.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub max_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            max_level: Level::ERROR,
            enable_stdout: true,
        }
    }
}

/// Owner of the adapter worker started by [`init_tracing`].
///
/// Call [`shutdown`](Self::shutdown) before the process exits so that an
/// open transaction is committed and the adapter's handle released.
pub struct SinkGuard {
    control: TransactionControl,
    worker: JoinHandle<()>,
}

impl SinkGuard {
    pub fn control(&self) -> TransactionControl {
        self.control.clone()
    }

    /// Commit, close the adapter and wait for the worker to exit.
    pub async fn shutdown(self) -> Result<(), ControlError> {
        let result = self.control.shutdown().await;
        let _ = self.worker.await;
        result
    }
}

/// Install a global subscriber forwarding events to `adapter`.
///
/// **Parameters**
/// - `adapter`: any [`LogSink`]; it is moved into a background task that
///   becomes its only caller.
/// - `config`: [`LayerConfig`] controlling buffering, level and console
///   output.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    adapter: Box<dyn LogSink>,
    config: LayerConfig,
) -> Result<SinkGuard, SetGlobalDefaultError> {
    let (layer, worker) = AdapterLayer::new(adapter, config.channel_buffer, config.max_level);
    let control = layer.control();

    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(config.max_level));
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(SinkGuard { control, worker })
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(adapter: Box<dyn LogSink>) -> Result<SinkGuard, SetGlobalDefaultError> {
    init_tracing_with_config(adapter, LayerConfig::default())
}
