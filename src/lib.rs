pub mod api;
pub mod core;

use tracing_subscriber::EnvFilter;

/// 安装日志输出（stderr，`RUST_LOG` 控制级别，默认 info），重复调用无副作用
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
