mod claims;
mod extractor;
mod jwt;

pub use claims::Claims;
pub use extractor::AuthUser;
pub use jwt::JwtValidator;
