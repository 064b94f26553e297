use crate::action_log::ActionLog;
use crate::card::{Card, ordered_sequence};
use crate::config::SessionConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type SessionId = Uuid;
pub type TableId = Uuid;
pub type PlayerId = Uuid;

/// 筹码数量
pub type Chips = u64;

/// 一局牌的全部状态
///
/// 没有 `#[serde(skip)]` 的字段是持久化的内容，存储层必须无损往返；
/// 跳过的字段（筹码、座位、当前下注、发牌游标等）只在运行时存在，
/// 需要时通过重放动作日志得到。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub table_id: TableId,
    pub card_sequence: Vec<Card>,     // 洗好的牌序列，开始前是顺序排列的一副牌
    pub started_at: Option<DateTime<Utc>>,  // None 表示还没发生
    pub ended_at: Option<DateTime<Utc>>,
    pub person_count: usize,
    #[serde(flatten)]
    pub config: SessionConfig,
    pub buy_ins: Vec<BuyIn>,
    pub action_log: ActionLog,
    pub ledgers: Vec<Ledger>,

    #[serde(skip)]
    pub next_card_index: usize,  // 下一张要发的牌在 card_sequence 中的位置，只增不减
    #[serde(skip)]
    pub current_round: u32,
    #[serde(skip)]
    pub current_dealer: usize,  // 庄家座次索引
    #[serde(skip)]
    pub stacks: HashMap<PlayerId, Chips>,  // 剩余筹码
    #[serde(skip)]
    pub seats: HashMap<PlayerId, Seat>,
    // 选座暂存区，在下一局才生效
    #[serde(skip)]
    pub next_seats: HashMap<PlayerId, u8>,
    // 当前下注轮中每个玩家已经投入的总额，每轮开始时清空
    #[serde(skip)]
    pub current_bets: HashMap<PlayerId, Chips>,
    // 牌局开始后离开的玩家离开时的筹码，结束时计入结算
    #[serde(skip)]
    pub departed: HashMap<PlayerId, Chips>,
    #[serde(skip)]
    pub in_round: bool,
    #[serde(skip)]
    pub join_sequence: u64,
}

/// 在座玩家的座位信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub number: Option<u8>,  // 座位号 [1, MAX_SEATS]，None 表示还没选
    pub joined: u64,         // 入座顺序
}

/// 玩家带入的筹码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyIn {
    pub player_id: PlayerId,
    pub amount: Chips,
}

/// 牌局结束时每个玩家的最终余额，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub id: Uuid,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub balance: Chips,
}

// --- SessionState 的实现方法 ---

impl SessionState {
    pub fn new(table_id: TableId, person_count: usize, config: SessionConfig) -> Self {
        SessionState {
            id: Uuid::new_v4(),
            table_id,
            card_sequence: ordered_sequence(),
            started_at: None,
            ended_at: None,
            person_count,
            config,
            buy_ins: Vec::new(),
            action_log: ActionLog::new(),
            ledgers: Vec::new(),
            next_card_index: 0,
            current_round: 0,
            current_dealer: 0,
            stacks: HashMap::new(),
            seats: HashMap::new(),
            next_seats: HashMap::new(),
            current_bets: HashMap::new(),
            departed: HashMap::new(),
            in_round: false,
            join_sequence: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// 在座玩家的顺序：先按座位号，没选座位的排在后面，再按入座先后
    pub fn seating_order(&self) -> Vec<PlayerId> {
        let mut seated: Vec<(&PlayerId, &Seat)> = self.seats.iter().collect();
        seated.sort_by_key(|(_, seat)| (seat.number.unwrap_or(u8::MAX), seat.joined));
        seated.into_iter().map(|(id, _)| *id).collect()
    }

    /// 只有开始之后、结束之前才能发牌
    pub fn is_dealing(&self) -> bool {
        self.is_started() && !self.is_ended()
    }

    /// 牌堆中还没发出的牌数
    pub fn remaining_cards(&self) -> usize {
        self.card_sequence.len() - self.next_card_index
    }
}
