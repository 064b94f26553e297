//! 牌局状态机的核心逻辑
//!
//! 这里的函数都直接操作 `&mut SessionState`，本身不加锁。
//! 调用方（`GameSession`）负责持有唯一的写锁，并且只在锁内调用一次；
//! 需要连带触发其他操作时（例如最后一个玩家离开后自动结束牌局），
//! 在这里直接调用对应的内部函数，而不是再去调用加锁的公开方法。

use crate::action_log::{ActionCode, LogEntry, ShortId};
use crate::card::{Card, shuffled_sequence};
use crate::config::MAX_SEATS;
use crate::error::SessionError;
use crate::state::*;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

// --- 核心牌局流程函数 ---

/// 开始牌局
///
/// - 检查人数和买入是否满足开局条件。
/// - 按买入金额设置每个玩家的筹码。
/// - 洗牌并重置发牌游标。
/// - 开启第 1 轮，庄家座次为 0，并写入开始条目。
pub fn start_session<R: Rng + ?Sized>(state: &mut SessionState, rng: &mut R) -> Result<(), SessionError> {
    // 直接检查时间戳，不能再去获取锁
    if state.is_started() {
        return rejected(SessionError::AlreadyStarted);
    }
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    if state.person_count < 2 {
        return rejected(SessionError::NotEnoughPlayers { count: state.person_count });
    }
    if state.person_count > MAX_SEATS {
        return rejected(SessionError::TooManyPlayers { count: state.person_count });
    }
    if state.buy_ins.len() != state.person_count {
        return rejected(SessionError::IncompleteBuyIns {
            buy_ins: state.buy_ins.len(),
            players: state.person_count,
        });
    }
    if let Some(bad) = state.buy_ins.iter().find(|b| !state.config.accepts_buy_in(b.amount)) {
        return rejected(SessionError::InvalidBuyIn(bad.player_id));
    }

    let now = Utc::now();
    state.started_at = Some(now);
    state.current_round = 1;
    state.current_dealer = 0;
    state.in_round = true;
    state.current_bets.clear();
    state.stacks = state.buy_ins.iter().map(|b| (b.player_id, b.amount)).collect();
    state.card_sequence = shuffled_sequence(rng);
    state.next_card_index = 0;

    let config = &state.config;
    let entry = LogEntry::Start {
        small_blind: config.small_blind,
        big_blind: config.big_blind,
        ante: config.ante,
        run_it_twice: config.allow_run_it_twice,
        straddle: config.allow_straddle,
        timestamp: now.timestamp(),
    };
    state.action_log.push(&entry);
    info!(session = %state.id, players = state.person_count, "牌局开始");
    Ok(())
}

/// 结束牌局
pub fn end_session(state: &mut SessionState) -> Result<(), SessionError> {
    if !state.is_started() {
        return rejected(SessionError::NotStarted);
    }
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    finish_session(state);
    Ok(())
}

/// 结束牌局的实际效果：记录结束时间，生成结算表，写入结束条目。
/// 调用方已经确认牌局开始且尚未结束。
fn finish_session(state: &mut SessionState) {
    let now = Utc::now();
    state.ended_at = Some(now);
    state.in_round = false;

    // 按买入顺序为每位参与者生成结算，已离开的玩家按离开时的筹码计算
    let ledgers: Vec<Ledger> = state
        .buy_ins
        .iter()
        .map(|b| {
            let balance = state
                .stacks
                .get(&b.player_id)
                .or_else(|| state.departed.get(&b.player_id))
                .copied()
                .unwrap_or(0);
            Ledger {
                id: Uuid::new_v4(),
                session_id: state.id,
                player_id: b.player_id,
                balance,
            }
        })
        .collect();

    let balances = ledgers.iter().map(|l| (ShortId::from(l.player_id), l.balance)).collect();
    state.ledgers = ledgers;
    state.action_log.push(&LogEntry::End { balances, timestamp: now.timestamp() });
    info!(session = %state.id, ledgers = state.ledgers.len(), "牌局结束");
}

/// 结束当前一轮，清空本轮下注并轮换庄家
pub fn end_round(state: &mut SessionState) -> Result<(), SessionError> {
    if !state.is_started() {
        return rejected(SessionError::NotStarted);
    }
    if !state.in_round {
        return rejected(SessionError::RoundNotActive);
    }
    state.in_round = false;
    state.current_bets.clear();
    if state.person_count > 0 {
        state.current_dealer = (state.current_dealer + 1) % state.person_count;
    }
    debug!(round = state.current_round, dealer = state.current_dealer, "一轮结束");
    Ok(())
}

/// 上一轮结束后开始新的一轮
pub fn start_round(state: &mut SessionState) -> Result<(), SessionError> {
    if !state.is_started() {
        return rejected(SessionError::NotStarted);
    }
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    if state.in_round {
        return rejected(SessionError::RoundAlreadyActive);
    }
    state.current_round += 1;
    state.in_round = true;
    state.current_bets.clear();
    debug!(round = state.current_round, "新的一轮开始");
    Ok(())
}

// --- 发牌 ---

/// 从游标处取出接下来的 `count` 张牌，不重新洗牌。
/// 牌局未开始、已结束或剩余的牌不够时返回空，游标不动。
pub fn deal_cards(state: &mut SessionState, count: usize) -> Vec<Card> {
    if !state.is_dealing() {
        debug!(started = state.is_started(), ended = state.is_ended(), "当前不能发牌");
        return Vec::new();
    }
    if count > state.remaining_cards() {
        debug!(count, remaining = state.remaining_cards(), "剩余的牌不够");
        return Vec::new();
    }
    let start = state.next_card_index;
    state.next_card_index += count;
    state.card_sequence[start..state.next_card_index].to_vec()
}

/// 按座次给每位玩家发两张底牌
pub fn deal_hands(state: &mut SessionState) -> Vec<[Card; 2]> {
    if !state.is_dealing() || state.person_count * 2 > state.remaining_cards() {
        return Vec::new();
    }
    (0..state.person_count)
        .map(|_| {
            let cards = deal_cards(state, 2);
            [cards[0], cards[1]]
        })
        .collect()
}

// --- 玩家管理 ---

/// 记录玩家买入
///
/// 只能在开局前买入；同一玩家再次买入会覆盖之前的金额。
pub fn record_buy_in(state: &mut SessionState, player_id: PlayerId, amount: Chips) -> Result<(), SessionError> {
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    if state.is_started() {
        return rejected(SessionError::AlreadyStarted);
    }
    if !state.config.accepts_buy_in(amount) {
        return rejected(SessionError::BuyInOutOfRange {
            amount,
            min: state.config.min_buy_in,
            max: state.config.max_buy_in,
        });
    }

    match state.buy_ins.iter_mut().find(|b| b.player_id == player_id) {
        Some(existing) => existing.amount = amount,
        None => state.buy_ins.push(BuyIn { player_id, amount }),
    }
    state.stacks.insert(player_id, amount);
    append_player_entry(state, player_id, ActionCode::BuyIn, amount);
    debug!(player = %player_id, amount, "玩家买入");
    Ok(())
}

/// 玩家入座，人数随之更新。任何时候都可以加入。
pub fn join_table(state: &mut SessionState, player_id: PlayerId) -> Result<(), SessionError> {
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    if state.seats.contains_key(&player_id) {
        return rejected(SessionError::AlreadyJoined(player_id));
    }
    state.seats.insert(player_id, Seat { number: None, joined: state.join_sequence });
    state.join_sequence += 1;
    state.person_count = state.seats.len();
    append_player_entry(state, player_id, ActionCode::Join, 0);
    debug!(player = %player_id, players = state.person_count, "玩家入座");
    Ok(())
}

/// 玩家离开牌桌
///
/// 移除座位、筹码和当前下注。已开始的牌局在最后一位玩家离开时自动结束，
/// 结束逻辑在同一个临界区里直接执行。返回牌局是否因此结束。
pub fn quit_table(state: &mut SessionState, player_id: PlayerId) -> Result<bool, SessionError> {
    if !state.seats.contains_key(&player_id) {
        return rejected(SessionError::UnknownPlayer(player_id));
    }
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    state.seats.remove(&player_id);
    if let Some(stack) = state.stacks.remove(&player_id) {
        if state.is_started() {
            state.departed.insert(player_id, stack);
        }
    }
    state.current_bets.remove(&player_id);
    state.next_seats.remove(&player_id);
    state.person_count = state.seats.len();
    append_player_entry(state, player_id, ActionCode::Quit, 0);
    debug!(player = %player_id, players = state.person_count, "玩家离开");

    if state.person_count == 0 && state.is_started() {
        info!(session = %state.id, "最后一位玩家离开，自动结束牌局");
        finish_session(state);
        return Ok(true);
    }
    Ok(false)
}

/// 为下一局选择座位，不影响当前牌局
pub fn choose_seat(state: &mut SessionState, player_id: PlayerId, seat: u8) -> Result<(), SessionError> {
    if state.is_ended() {
        return rejected(SessionError::AlreadyEnded);
    }
    if !state.seats.contains_key(&player_id) {
        return rejected(SessionError::UnknownPlayer(player_id));
    }
    if seat < 1 || seat as usize > MAX_SEATS {
        return rejected(SessionError::InvalidSeat(seat));
    }
    if state.next_seats.iter().any(|(pid, s)| *pid != player_id && *s == seat) {
        return rejected(SessionError::SeatTaken(seat));
    }
    state.next_seats.insert(player_id, seat);
    append_player_entry(state, player_id, ActionCode::Seat, seat as Chips);
    debug!(player = %player_id, seat, "玩家选座");
    Ok(())
}

// --- 下注动作 ---

/// 记录玩家的一个动作
///
/// `amount` 是该玩家本轮下注后的总额。只扣除达到这个总额还差的部分；
/// 动作本身是否合法（加注幅度等）不在这里判断，由日志校验负责。
pub fn handle_player_action(
    state: &mut SessionState,
    player_id: PlayerId,
    code: ActionCode,
    amount: Chips,
) -> Result<(), SessionError> {
    if !state.in_round {
        return rejected(SessionError::RoundNotActive);
    }
    let Some(&stack) = state.stacks.get(&player_id) else {
        return rejected(SessionError::UnknownPlayer(player_id));
    };
    let committed = state.current_bets.get(&player_id).copied().unwrap_or(0);
    let need = amount.saturating_sub(committed);
    if need > stack {
        return rejected(SessionError::InsufficientChips { need, stack });
    }

    state.stacks.insert(player_id, stack - need);
    state.current_bets.insert(player_id, amount);
    append_player_entry(state, player_id, code, amount);
    debug!(player = %player_id, action = code.word(), amount, "玩家动作");
    Ok(())
}

// --- 下一局 ---

/// 同一张桌子的下一局：配置不变，座位按选座暂存区更新
pub fn successor(state: &SessionState) -> SessionState {
    let mut next = SessionState::new(state.table_id, state.seats.len(), state.config.clone());
    next.seats = state
        .seats
        .iter()
        .map(|(pid, seat)| {
            let number = state.next_seats.get(pid).copied().or(seat.number);
            (*pid, Seat { number, joined: seat.joined })
        })
        .collect();
    next.join_sequence = state.join_sequence;
    next
}

// --- 辅助函数 ---

fn append_player_entry(state: &mut SessionState, player_id: PlayerId, code: ActionCode, amount: Chips) {
    state.action_log.push(&LogEntry::Action {
        player: ShortId::from(player_id),
        code,
        amount,
        timestamp: Utc::now().timestamp(),
    });
}

fn rejected<T>(err: SessionError) -> Result<T, SessionError> {
    warn!(%err, "操作被拒绝");
    Err(err)
}

// --- 单元测试 ---
