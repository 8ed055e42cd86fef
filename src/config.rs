use serde::{Deserialize, Serialize};
use std::env;

/// 每次获奖奖励的金币
pub const DEFAULT_WIN_AWARD: i64 = 10;
/// 兑换一次奖品消耗的金币
pub const DEFAULT_REDEMPTION_COST: i64 = 30;
/// 每个奖品的获奖人数上限
pub const DEFAULT_WINNER_CAP: i32 = 3;
/// 调度器广播间隔（秒）
pub const DEFAULT_BROADCAST_INTERVAL_SECS: u64 = 60;
/// 排行榜展示人数
pub const DEFAULT_LEADERBOARD_SIZE: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Compared against the `X-Telegram-Bot-Api-Secret-Token` header when set.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Only these user ids may upload new prize images.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub image_dir: String,
    pub hidden_dir: String,
}

/// The game's tunable surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameConfig {
    pub win_award: i64,
    pub redemption_cost: i64,
    pub winner_cap: i32,
    pub broadcast_interval_secs: u64,
    pub leaderboard_size: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            image_dir: "img".to_string(),
            hidden_dir: "hidden_img".to_string(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_award: DEFAULT_WIN_AWARD,
            redemption_cost: DEFAULT_REDEMPTION_COST,
            winner_cap: DEFAULT_WINNER_CAP,
            broadcast_interval_secs: DEFAULT_BROADCAST_INTERVAL_SECS,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str)
                    .map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 无配置文件时 DATABASE_URL 与 BOT_TOKEN 必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;
                let bot_token = get_env("BOT_TOKEN")
                    .ok_or("BOT_TOKEN is not set and config.toml was not found")?;

                let defaults = GameConfig::default();
                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 5u32),
                    },
                    telegram: TelegramConfig {
                        bot_token,
                        api_base_url: get_env("TELEGRAM_API_BASE_URL")
                            .unwrap_or_else(default_api_base_url),
                        webhook_secret: get_env("TELEGRAM_WEBHOOK_SECRET"),
                        admin_ids: get_env("ADMIN_IDS")
                            .map(|v| parse_id_list(&v))
                            .unwrap_or_default(),
                    },
                    assets: AssetsConfig {
                        image_dir: get_env("IMAGE_DIR").unwrap_or_else(|| "img".to_string()),
                        hidden_dir: get_env("HIDDEN_IMAGE_DIR")
                            .unwrap_or_else(|| "hidden_img".to_string()),
                    },
                    game: GameConfig {
                        win_award: get_env_parse("GAME_WIN_AWARD", defaults.win_award),
                        redemption_cost: get_env_parse(
                            "GAME_REDEMPTION_COST",
                            defaults.redemption_cost,
                        ),
                        winner_cap: get_env_parse("GAME_WINNER_CAP", defaults.winner_cap),
                        broadcast_interval_secs: get_env_parse(
                            "GAME_BROADCAST_INTERVAL_SECS",
                            defaults.broadcast_interval_secs,
                        ),
                        leaderboard_size: get_env_parse(
                            "GAME_LEADERBOARD_SIZE",
                            defaults.leaderboard_size,
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("BOT_TOKEN") {
            config.telegram.bot_token = v;
        }
        if let Ok(v) = env::var("TELEGRAM_API_BASE_URL") {
            config.telegram.api_base_url = v;
        }
        if let Ok(v) = env::var("TELEGRAM_WEBHOOK_SECRET") {
            config.telegram.webhook_secret = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_IDS") {
            config.telegram.admin_ids = parse_id_list(&v);
        }
        if let Ok(v) = env::var("IMAGE_DIR") {
            config.assets.image_dir = v;
        }
        if let Ok(v) = env::var("HIDDEN_IMAGE_DIR") {
            config.assets.hidden_dir = v;
        }
        if let Ok(v) = env::var("GAME_WIN_AWARD")
            && let Ok(n) = v.parse()
        {
            config.game.win_award = n;
        }
        if let Ok(v) = env::var("GAME_REDEMPTION_COST")
            && let Ok(n) = v.parse()
        {
            config.game.redemption_cost = n;
        }
        if let Ok(v) = env::var("GAME_WINNER_CAP")
            && let Ok(n) = v.parse()
        {
            config.game.winner_cap = n;
        }
        if let Ok(v) = env::var("GAME_BROADCAST_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.game.broadcast_interval_secs = n;
        }
        if let Ok(v) = env::var("GAME_LEADERBOARD_SIZE")
            && let Ok(n) = v.parse()
        {
            config.game.leaderboard_size = n;
        }

        config.game.validate()?;
        Ok(config)
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.win_award < 0 {
            return Err("game.win_award must not be negative".into());
        }
        if self.redemption_cost <= 0 {
            return Err("game.redemption_cost must be positive".into());
        }
        if self.winner_cap <= 0 {
            return Err("game.winner_cap must be positive".into());
        }
        if self.broadcast_interval_secs == 0 {
            return Err("game.broadcast_interval_secs must be positive".into());
        }
        Ok(())
    }
}

/// Parses a comma separated list such as `"123, 456"`, skipping malformed entries.
fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .collect()
}
