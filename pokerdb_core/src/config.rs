//! 牌局配置
//!
//! 盲注、前注、可选玩法和买入范围。可以直接构造，也可以从 JSON 读取：
//!
//! ```json
//! {
//!   "small_blind": 50,
//!   "big_blind": 100,
//!   "min_buy_in": 1000,
//!   "max_buy_in": 10000,
//!   "allow_straddle": true
//! }
//! ```
//!
//! 没有给出的字段取默认值，`max_buy_in` 缺省表示不设上限。

use crate::error::ConfigError;
use crate::state::Chips;
use serde::{Deserialize, Serialize};

/// 一桌最多的座位数，座位号从 1 开始
pub const MAX_SEATS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub ante: Chips,
    pub allow_run_it_twice: bool,
    pub allow_straddle: bool,
    pub min_buy_in: Chips,
    pub max_buy_in: Option<Chips>,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.small_blind > self.big_blind {
            return Err(ConfigError::BlindsOutOfOrder {
                small_blind: self.small_blind,
                big_blind: self.big_blind,
            });
        }
        if let Some(max) = self.max_buy_in {
            if self.min_buy_in > max {
                return Err(ConfigError::BuyInRangeInverted { min: self.min_buy_in, max });
            }
        }
        Ok(())
    }

    /// 买入金额是否在 [min, max] 范围内
    pub fn accepts_buy_in(&self, amount: Chips) -> bool {
        amount >= self.min_buy_in && self.max_buy_in.is_none_or(|max| amount <= max)
    }
}
