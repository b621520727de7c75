pub mod jwt;
pub mod password;
pub mod tokens;
pub mod middleware;

pub use jwt::*;
pub use password::*;
pub use tokens::*;
pub use middleware::*;
