//! Централизованная конфигурация для Tandem Core
//!
//! Все константы протокола должны быть определены здесь,
//! чтобы избежать хардкода по всему проекту.

use std::sync::OnceLock;

/// Глобальная конфигурация (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // КРИПТОГРАФИЧЕСКИЕ ПАРАМЕТРЫ
    // ============================================

    /// Длина симметричного ключа AES-256 (в байтах)
    pub symmetric_key_length: usize,

    /// Длина IV для AES-CTR (в байтах)
    pub iv_length: usize,

    /// Длина ключа HMAC (в байтах)
    pub hash_key_length: usize,

    /// Длина HMAC-SHA256 (в байтах)
    pub mac_length: usize,

    /// Размер Ed25519 подписи (в байтах)
    pub signature_size: usize,

    /// Размер публичного ключа X25519 / Ed25519 (в байтах)
    pub public_key_size: usize,

    /// Накладные расходы sealed box: ephemeral key + nonce + Poly1305 tag
    pub sealed_box_overhead: usize,

    // ============================================
    // ПРОТОКОЛ
    // ============================================

    /// Максимальный размер plaintext одного сообщения (в байтах)
    pub max_plaintext_length: usize,

    /// Сколько Content-конвертов из будущей эпохи можно держать в очереди
    pub max_pending_content: usize,

    /// Новый key exchange перед каждым сообщением
    pub rekey_every_message: bool,

    /// Ёмкость очереди команд драйвера сессии
    pub command_queue_capacity: usize,

    // ============================================
    // КОМНАТЫ / UI
    // ============================================

    /// Диапазон номеров комнат для случайного fallback
    pub room_count: u32,

    /// Длина snippet публичного ключа для уведомлений
    pub key_snippet_length: usize,
}

impl Config {
    /// Создать конфигурацию с дефолтными значениями
    pub fn default() -> Self {
        Self {
            // Криптография
            symmetric_key_length: 32,
            iv_length: 16,
            hash_key_length: 32,
            mac_length: 32,
            signature_size: 64,
            public_key_size: 32,
            sealed_box_overhead: 32 + 12 + 16,

            // Протокол
            max_plaintext_length: 64 * 1024,
            max_pending_content: 16,
            rekey_every_message: false,
            command_queue_capacity: 64,

            // Комнаты
            room_count: 1000,
            key_snippet_length: 6,
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TANDEM_MAX_PENDING_CONTENT") {
            if let Ok(parsed) = val.parse() {
                config.max_pending_content = parsed;
            }
        }

        if let Ok(val) = std::env::var("TANDEM_REKEY_EVERY_MESSAGE") {
            if let Ok(parsed) = val.parse() {
                config.rekey_every_message = parsed;
            }
        }

        if let Ok(val) = std::env::var("TANDEM_MAX_PLAINTEXT_LENGTH") {
            if let Ok(parsed) = val.parse() {
                config.max_plaintext_length = parsed;
            }
        }

        if let Ok(val) = std::env::var("TANDEM_ROOM_COUNT") {
            if let Ok(parsed) = val.parse::<u32>() {
                if parsed > 0 {
                    config.room_count = parsed;
                }
            }
        }

        config
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию со значениями по умолчанию
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }

    /// Ожидаемый размер sealed box для plaintext длины `len`
    pub fn sealed_len(&self, len: usize) -> usize {
        len + self.sealed_box_overhead
    }
}
