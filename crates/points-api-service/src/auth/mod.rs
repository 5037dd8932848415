//! 认证模块
//!
//! JWT 验证与网关会话查询

mod jwt;
mod session;

pub use jwt::{Claims, JwtManager};
#[cfg(test)]
pub use session::MockSessionLookup;
pub use session::{AllowAllSessions, RedisSessionLookup, SessionLookup};
