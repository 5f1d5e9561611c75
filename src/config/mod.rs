mod settings;

pub use settings::{
    DatabaseConfig, DeliveryConfig, EmailBodySource, JwtConfig, ServerConfig, Settings,
};
