//! # 牌局记录核心库
//!
//! 这个 `core` crate 包含了牌局的状态管理、动作日志的编码与解码、
//! 下注合法性校验以及精确的胜率计算。
//! 它不涉及网络传输和存储后端，上层应用通过 `GameSession` 驱动牌局，
//! 通过 `SessionStore` 保存牌局记录。

mod action_log;
mod card;
mod config;
mod equity;
mod error;
mod evaluator;
mod logic;
mod session;
mod state;
mod store;
mod validate;

pub use action_log::*;
pub use card::*;
pub use config::*;
pub use equity::*;
pub use error::*;
pub use evaluator::*;
pub use session::*;
pub use state::*;
pub use store::*;

pub use validate::validate;
