//! 积分 API 服务
//!
//! 面向用户的订单上传、余额查询与提现 REST API。
//!
//! ## 模块结构
//!
//! - `auth`: JWT 验证与网关会话查询
//! - `middleware`: 认证中间件
//! - `dto`: 请求和响应的数据传输对象
//! - `error`: 错误类型定义
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由配置
//! - `state`: 应用状态
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 数据验证：validator
//! - 认证：jsonwebtoken（HS256）+ Redis 会话

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use routes::api_routes;
pub use state::AppState;
