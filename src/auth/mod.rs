pub mod jwt;
pub mod password;

pub use jwt::JwtService;
pub use password::PasswordService;
