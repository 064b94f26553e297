use crate::action_log::ActionCode;
use crate::state::{Chips, PlayerId, SessionId};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CardError {
    #[error("牌的编号必须在 1 到 52 之间，收到 {0}")]
    OutOfRange(u8),
}

/// 牌局状态机拒绝调用时返回的错误，返回后牌局状态保持不变
#[derive(Error, Debug, PartialEq, Eq, Clone, Hash)]
pub enum SessionError {
    #[error("牌局已经开始")]
    AlreadyStarted,
    #[error("牌局已经结束")]
    AlreadyEnded,
    #[error("牌局尚未开始")]
    NotStarted,
    #[error("玩家人数不足: {count}")]
    NotEnoughPlayers { count: usize },
    #[error("玩家人数过多: {count}")]
    TooManyPlayers { count: usize },
    #[error("买入未完成: {buy_ins} 笔买入, {players} 名玩家")]
    IncompleteBuyIns { buy_ins: usize, players: usize },
    #[error("玩家 {0} 的买入金额无效")]
    InvalidBuyIn(PlayerId),
    #[error("买入金额 {amount} 不在 [{min}, {}] 范围内", .max.map_or("∞".to_string(), |m| m.to_string()))]
    BuyInOutOfRange { amount: Chips, min: Chips, max: Option<Chips> },
    #[error("本轮已经在进行中")]
    RoundAlreadyActive,
    #[error("没有进行中的一轮")]
    RoundNotActive,
    #[error("未知玩家 {0}")]
    UnknownPlayer(PlayerId),
    #[error("玩家 {0} 已经加入")]
    AlreadyJoined(PlayerId),
    #[error("无效的座位号 {0}")]
    InvalidSeat(u8),
    #[error("座位 {0} 已被占用")]
    SeatTaken(u8),
    #[error("筹码不足: 需要 {need}, 剩余 {stack}")]
    InsufficientChips { need: Chips, stack: Chips },
}

/// 动作日志中的一行无法解析的原因
#[derive(Error, Debug, PartialEq, Eq, Clone, Hash)]
pub enum DecodeError {
    #[error("缺少时间戳")]
    MissingTimestamp,
    #[error("时间戳无效")]
    BadTimestamp,
    #[error("内容过短")]
    ShortBody,
    #[error("字段数量不足")]
    MissingFields,
    #[error("数值无效: {0:?}")]
    BadNumber(String),
    #[error("结算项无效: {0:?}")]
    BadLedgerPair(String),
    #[error("未知动作 {0}")]
    UnknownAction(char),
    #[error("玩家短 ID 无效: {0:?}")]
    BadShortId(String),
}

/// 下注合法性校验失败时违反的规则
#[derive(Error, Debug, PartialEq, Eq, Clone, Hash)]
pub enum Violation {
    #[error("条目格式错误: {0}")]
    Malformed(#[from] DecodeError),
    #[error("开始/结束标记出现在牌局中间")]
    UnexpectedMarker,
    #[error("无法识别的条目: {0:?}")]
    Unparsed(String),
    #[error("加注不高于当前下注")]
    RaiseBelowCurrentBet,
    #[error("加注幅度过小")]
    RaiseTooSmall,
    #[error("筹码不足以加注")]
    InsufficientChipsToRaise,
    #[error("跟注金额不符")]
    CallAmountMismatch,
    #[error("筹码不足以跟注，只能全下")]
    InsufficientChipsToCall,
    #[error("过牌金额必须为 0")]
    CheckAmountNonZero,
    #[error("全下金额必须等于剩余筹码")]
    AllInAmountMismatch,
    #[error("全下加注幅度过小")]
    AllInRaiseTooSmall,
    #[error("弃牌金额必须为 0")]
    FoldAmountNonZero,
    #[error("未知动作 {0}")]
    UnexpectedAction(ActionCode),
}

#[derive(Error, Debug, PartialEq, Eq, Clone, Hash)]
pub enum ValidationError {
    #[error("动作日志过短")]
    LogTooShort,
    #[error("缺少开始条目")]
    MissingStart,
    #[error("缺少结束条目")]
    MissingEnd,
    #[error("条目 {index} {entry:?}: {violation}")]
    Entry {
        index: usize,
        entry: String,
        violation: Violation,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("小盲 {small_blind} 大于大盲 {big_blind}")]
    BlindsOutOfOrder { small_blind: Chips, big_blind: Chips },
    #[error("最小买入 {min} 大于最大买入 {max}")]
    BuyInRangeInverted { min: Chips, max: Chips },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("牌局 {0} 不存在")]
    NotFound(SessionId),
    #[error("牌局记录序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}
