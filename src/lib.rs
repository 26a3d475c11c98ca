pub mod api;
pub mod booking;
pub mod config;
pub mod db;
pub mod token;

pub use db::DbPool;

use config::Config;
use token::TokenIssuer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let tokens = TokenIssuer::new(&config.auth.secret, config.auth.token_ttl_minutes);
        Self { config, db, tokens }
    }
}
