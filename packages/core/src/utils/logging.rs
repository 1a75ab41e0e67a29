// Логирование

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Установить fmt-подписчик tracing (RUST_LOG, по умолчанию `info`).
///
/// Повторные вызовы ничего не делают; если подписчик уже установлен
/// приложением, он остаётся.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
