use crate::action_log::{ActionCode, ActionLog};
use crate::card::Card;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::logic;
use crate::state::{BuyIn, Chips, Ledger, PlayerId, SessionId, SessionState, TableId};
use parking_lot::RwLock;
use rand::Rng;

/// 一局牌的线程安全封装
///
/// 所有可变状态都在一把读写锁后面：查询拿读锁，修改拿写锁。
/// 锁不可重入，每个公开方法只加一次锁，然后调用 `logic` 中不加锁的实现。
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    table_id: TableId,
    state: RwLock<SessionState>,
}

impl GameSession {
    pub fn new(table_id: TableId, person_count: usize, config: SessionConfig) -> Self {
        Self::from_state(SessionState::new(table_id, person_count, config))
    }

    /// 从持久化的记录恢复，运行时字段从空开始
    pub fn from_state(state: SessionState) -> Self {
        GameSession {
            id: state.id,
            table_id: state.table_id,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    // --- 只读查询 ---

    pub fn started(&self) -> bool {
        self.state.read().is_started()
    }

    pub fn ended(&self) -> bool {
        self.state.read().is_ended()
    }

    /// 每个日志条目的可读描述
    pub fn action_strings(&self) -> Vec<String> {
        self.state.read().action_log.render()
    }

    pub fn action_log(&self) -> ActionLog {
        self.state.read().action_log.clone()
    }

    pub fn buy_ins(&self) -> Vec<BuyIn> {
        self.state.read().buy_ins.clone()
    }

    pub fn ledgers(&self) -> Vec<Ledger> {
        self.state.read().ledgers.clone()
    }

    pub fn stack(&self, player_id: PlayerId) -> Option<Chips> {
        self.state.read().stacks.get(&player_id).copied()
    }

    pub fn current_bet(&self, player_id: PlayerId) -> Option<Chips> {
        self.state.read().current_bets.get(&player_id).copied()
    }

    pub fn next_seat(&self, player_id: PlayerId) -> Option<u8> {
        self.state.read().next_seats.get(&player_id).copied()
    }

    pub fn person_count(&self) -> usize {
        self.state.read().person_count
    }

    pub fn current_round(&self) -> u32 {
        self.state.read().current_round
    }

    pub fn current_dealer(&self) -> usize {
        self.state.read().current_dealer
    }

    pub fn in_round(&self) -> bool {
        self.state.read().in_round
    }

    pub fn next_card_index(&self) -> usize {
        self.state.read().next_card_index
    }

    pub fn seating_order(&self) -> Vec<PlayerId> {
        self.state.read().seating_order()
    }

    /// 整个状态的副本，包括运行时字段
    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    // --- 牌局生命周期 ---

    pub fn start(&self) -> Result<(), SessionError> {
        self.start_with_rng(&mut rand::rng())
    }

    pub fn start_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(), SessionError> {
        logic::start_session(&mut self.state.write(), rng)
    }

    pub fn end(&self) -> Result<(), SessionError> {
        logic::end_session(&mut self.state.write())
    }

    pub fn start_round(&self) -> Result<(), SessionError> {
        logic::start_round(&mut self.state.write())
    }

    pub fn end_round(&self) -> Result<(), SessionError> {
        logic::end_round(&mut self.state.write())
    }

    /// 同一张桌子的下一局
    pub fn successor(&self) -> GameSession {
        GameSession::from_state(logic::successor(&self.state.read()))
    }

    // --- 发牌 ---

    pub fn deal(&self, count: usize) -> Vec<Card> {
        logic::deal_cards(&mut self.state.write(), count)
    }

    pub fn deal_hands(&self) -> Vec<[Card; 2]> {
        logic::deal_hands(&mut self.state.write())
    }

    // --- 玩家 ---

    pub fn buy_in(&self, player_id: PlayerId, amount: Chips) -> Result<(), SessionError> {
        logic::record_buy_in(&mut self.state.write(), player_id, amount)
    }

    pub fn join(&self, player_id: PlayerId) -> Result<(), SessionError> {
        logic::join_table(&mut self.state.write(), player_id)
    }

    /// 离开牌桌；最后一位玩家离开已开始的牌局时自动结束
    pub fn quit(&self, player_id: PlayerId) -> Result<(), SessionError> {
        logic::quit_table(&mut self.state.write(), player_id).map(|_| ())
    }

    pub fn choose_seat(&self, player_id: PlayerId, seat: u8) -> Result<(), SessionError> {
        logic::choose_seat(&mut self.state.write(), player_id, seat)
    }

    pub fn add_action(&self, player_id: PlayerId, code: ActionCode, amount: Chips) -> Result<(), SessionError> {
        logic::handle_player_action(&mut self.state.write(), player_id, code, amount)
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::{LogEntry, ShortId};
    use crate::card::DECK_SIZE;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use std::thread;
    use uuid::Uuid;

    fn config() -> SessionConfig {
        SessionConfig {
            small_blind: 50,
            big_blind: 100,
            min_buy_in: 100,
            max_buy_in: Some(1000),
            ..Default::default()
        }
    }

    fn started_session(stacks: &[Chips]) -> (GameSession, Vec<PlayerId>) {
        let session = GameSession::new(Uuid::new_v4(), stacks.len(), config());
        let ids: Vec<PlayerId> = stacks.iter().map(|_| Uuid::new_v4()).collect();
        for (id, &amount) in ids.iter().zip(stacks) {
            session.buy_in(*id, amount).unwrap();
        }
        session.start_with_rng(&mut StdRng::seed_from_u64(1)).unwrap();
        (session, ids)
    }

    fn count_end_entries(session: &GameSession) -> usize {
        session
            .action_log()
            .entries()
            .filter(|e| matches!(e, LogEntry::End { .. }))
            .count()
    }

    #[test_log::test]
    fn test_start_end_errors() {
        let session = GameSession::new(Uuid::new_v4(), 1, config());
        assert_eq!(session.start(), Err(SessionError::NotEnoughPlayers { count: 1 }));
        assert_eq!(session.end(), Err(SessionError::NotStarted));

        let (session, _) = started_session(&[200, 200]);
        assert_eq!(session.start(), Err(SessionError::AlreadyStarted));
        session.end().unwrap();
        assert!(session.ended());
        assert_eq!(session.end(), Err(SessionError::AlreadyEnded));
        assert_eq!(session.start(), Err(SessionError::AlreadyStarted));
        assert_eq!(count_end_entries(&session), 1);
    }

    #[test_log::test]
    fn test_buy_in_policy() {
        let session = GameSession::new(Uuid::new_v4(), 2, config());
        assert_eq!(
            session.start(),
            Err(SessionError::IncompleteBuyIns { buy_ins: 0, players: 2 })
        );

        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            session.buy_in(p1, 50),
            Err(SessionError::BuyInOutOfRange { amount: 50, min: 100, max: Some(1000) })
        );
        session.buy_in(p1, 200).unwrap();
        // 开局前再次买入会覆盖之前的金额
        session.buy_in(p1, 400).unwrap();
        session.buy_in(p2, 300).unwrap();
        assert_eq!(session.buy_ins().len(), 2);
        assert_eq!(session.stack(p1), Some(400));

        session.start().unwrap();
        assert_eq!(session.buy_in(Uuid::new_v4(), 200), Err(SessionError::AlreadyStarted));
        session.end().unwrap();
        assert_eq!(session.buy_in(Uuid::new_v4(), 200), Err(SessionError::AlreadyEnded));
    }

    #[test]
    fn test_add_action_insufficient_chips() {
        let (session, ids) = started_session(&[100, 100]);
        assert_eq!(
            session.add_action(ids[0], ActionCode::Raise, 200),
            Err(SessionError::InsufficientChips { need: 200, stack: 100 })
        );
        assert!(matches!(
            session.add_action(Uuid::new_v4(), ActionCode::Raise, 10),
            Err(SessionError::UnknownPlayer(_))
        ));
        session.add_action(ids[0], ActionCode::AllIn, 100).unwrap();
        assert_eq!(session.stack(ids[0]), Some(0));
        assert_eq!(session.current_bet(ids[0]), Some(100));
    }

    #[test]
    fn test_action_requires_active_round() {
        let session = GameSession::new(Uuid::new_v4(), 2, config());
        let p1 = Uuid::new_v4();
        session.buy_in(p1, 200).unwrap();
        assert_eq!(session.add_action(p1, ActionCode::Check, 0), Err(SessionError::RoundNotActive));

        let (session, ids) = started_session(&[200, 200]);
        session.end_round().unwrap();
        assert_eq!(session.add_action(ids[0], ActionCode::Check, 0), Err(SessionError::RoundNotActive));
        session.start_round().unwrap();
        session.add_action(ids[0], ActionCode::Check, 0).unwrap();
    }

    #[test]
    fn test_round_toggles_require_start() {
        let session = GameSession::new(Uuid::new_v4(), 2, config());
        assert_eq!(session.start_round(), Err(SessionError::NotStarted));
        assert_eq!(session.end_round(), Err(SessionError::NotStarted));

        let (session, _) = started_session(&[200, 200]);
        assert_eq!(session.start_round(), Err(SessionError::RoundAlreadyActive));
        session.end().unwrap();
        assert_eq!(session.start_round(), Err(SessionError::AlreadyEnded));
        assert_eq!(session.end_round(), Err(SessionError::RoundNotActive));
    }

    #[test]
    fn test_deal_never_repeats_or_skips() {
        let (session, _) = started_session(&[200, 200]);
        let sequence = session.snapshot().card_sequence;

        let mut dealt = Vec::new();
        dealt.extend(session.deal_hands().into_iter().flatten());
        for k in [3, 1, 1, 7, 13, 20] {
            let cards = session.deal(k);
            assert_eq!(cards.len(), k);
            dealt.extend(cards);
        }
        assert_eq!(session.next_card_index(), 49);
        assert_eq!(dealt, sequence[..49].to_vec());

        // 剩余 3 张，不够 4 张
        assert!(session.deal(4).is_empty());
        assert_eq!(session.snapshot().next_card_index, 49);
        assert_eq!(session.deal(3).len(), 3);
        assert_eq!(session.snapshot().next_card_index, DECK_SIZE);
        assert!(session.deal(1).is_empty());

        let unique: HashSet<Card> = sequence.into_iter().collect();
        assert_eq!(unique.len(), DECK_SIZE);
    }

    #[test]
    fn test_join_quit_seat() {
        let session = GameSession::new(Uuid::new_v4(), 0, config());
        let p1 = Uuid::new_v4();
        session.join(p1).unwrap();
        assert_eq!(session.join(p1), Err(SessionError::AlreadyJoined(p1)));
        session.choose_seat(p1, 3).unwrap();
        assert_eq!(session.next_seat(p1), Some(3));
        session.quit(p1).unwrap();
        assert_eq!(session.quit(p1), Err(SessionError::UnknownPlayer(p1)));
        assert_eq!(session.snapshot().person_count, 0);
        // join + seat + quit
        assert_eq!(session.action_log().len(), 3);
    }

    #[test]
    fn test_seat_validation() {
        let session = GameSession::new(Uuid::new_v4(), 0, config());
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        session.join(p1).unwrap();
        session.join(p2).unwrap();
        assert_eq!(session.choose_seat(p1, 10), Err(SessionError::InvalidSeat(10)));
        assert_eq!(session.choose_seat(p1, 0), Err(SessionError::InvalidSeat(0)));
        assert!(matches!(
            session.choose_seat(Uuid::new_v4(), 1),
            Err(SessionError::UnknownPlayer(_))
        ));
        session.choose_seat(p1, 2).unwrap();
        assert_eq!(session.choose_seat(p2, 2), Err(SessionError::SeatTaken(2)));
        // 自己重复选同一个座位没问题
        session.choose_seat(p1, 2).unwrap();
        session.choose_seat(p2, 9).unwrap();
        assert_eq!(session.seating_order().len(), 2);
    }

    #[test_log::test]
    fn test_last_player_quit_ends_session_once() {
        let session = GameSession::new(Uuid::new_v4(), 0, config());
        let players: Vec<PlayerId> = (0..3).map(|_| Uuid::new_v4()).collect();
        for p in &players {
            session.join(*p).unwrap();
            session.buy_in(*p, 500).unwrap();
        }
        session.start().unwrap();

        session.quit(players[0]).unwrap();
        session.quit(players[1]).unwrap();
        assert!(!session.ended());

        // 最后一位玩家离开，同时已经离开的玩家重复调用
        let results: Vec<Result<(), SessionError>> = thread::scope(|s| {
            let handles: Vec<_> = [players[2], players[0], players[1], players[0], players[1]]
                .into_iter()
                .map(|p| {
                    let session = &session;
                    s.spawn(move || session.quit(p))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results[0].is_ok());
        for r in &results[1..] {
            assert!(matches!(r, Err(SessionError::UnknownPlayer(_))));
        }
        assert!(session.ended());
        assert_eq!(count_end_entries(&session), 1);
        // 离开的玩家仍然出现在结算中
        let ledgers = session.ledgers();
        assert_eq!(ledgers.iter().map(|l| l.player_id).collect::<Vec<_>>(), players);
        assert!(ledgers.iter().all(|l| l.balance == 500));
        assert_eq!(session.action_log().lines().last().map(|l| l.starts_with("E:")), Some(true));
    }

    #[test_log::test]
    fn test_concurrent_invalid_ops() {
        let session = GameSession::new(Uuid::new_v4(), 3, config());
        let (p1, p2, p3, missing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        thread::scope(|s| {
            s.spawn(|| assert!(session.add_action(p1, ActionCode::Raise, 100).is_err()));
            s.spawn(|| assert!(session.choose_seat(p1, 10).is_err()));
            s.spawn(|| assert!(session.quit(missing).is_err()));
            s.spawn(|| assert!(session.end().is_err()));
            s.spawn(|| assert!(session.buy_in(p1, 50).is_err()));
            s.spawn(|| assert!(session.start().is_err()));
        });
        assert!(session.action_log().is_empty());

        for p in [p1, p2, p3] {
            session.buy_in(p, 200).unwrap();
        }
        session.start().unwrap();

        thread::scope(|s| {
            s.spawn(|| session.add_action(p1, ActionCode::Check, 0).unwrap());
            s.spawn(|| session.add_action(p2, ActionCode::Raise, 200).unwrap());
            s.spawn(|| session.add_action(p3, ActionCode::Fold, 0).unwrap());
            s.spawn(|| assert!(session.add_action(missing, ActionCode::Raise, 100).is_err()));
        });
        assert_eq!(session.stack(p2), Some(0));
        session.end().unwrap();
    }

    #[test]
    fn test_concurrent_actions_keep_stacks_consistent() {
        let (session, ids) = started_session(&[1000, 1000, 1000, 1000]);

        // 每个线程为自己的玩家逐步加注到 1000，只扣差额
        thread::scope(|s| {
            for &player in &ids {
                let session = &session;
                s.spawn(move || {
                    for amount in (1..=10).map(|i| i * 100) {
                        session.add_action(player, ActionCode::Raise, amount).unwrap();
                    }
                });
            }
        });

        for &player in &ids {
            assert_eq!(session.stack(player), Some(0));
            assert_eq!(session.current_bet(player), Some(1000));
        }
        let raises = session
            .action_log()
            .entries()
            .filter(|e| matches!(e, LogEntry::Action { code: ActionCode::Raise, .. }))
            .count();
        assert_eq!(raises, 40);
    }

    #[test]
    fn test_action_strings_readable() {
        let (session, ids) = started_session(&[500, 500]);
        session.add_action(ids[0], ActionCode::Check, 0).unwrap();
        session.add_action(ids[1], ActionCode::Raise, 200).unwrap();
        session.end().unwrap();

        let lines = session.action_strings();
        // 两笔买入 + 开始 + 两个动作 + 结束
        assert_eq!(lines.len(), 6);
        assert!(lines[0].contains("buy-in 500"));
        assert!(lines[2].starts_with("start sb=50 bb=100"));
        assert!(lines[3].contains("check"));
        assert!(lines[4].contains("raise 200"));
        assert!(lines[5].starts_with("result ["));
        // 只读操作不修改日志
        assert_eq!(session.action_log().len(), 6);
    }

    #[test]
    fn test_end_writes_ledgers() {
        let (session, ids) = started_session(&[500, 300]);
        session.add_action(ids[0], ActionCode::Raise, 200).unwrap();
        session.end().unwrap();

        let ledgers = session.ledgers();
        assert_eq!(ledgers.len(), 2);
        assert_eq!(ledgers[0].player_id, ids[0]);
        assert_eq!(ledgers[0].balance, 300);
        assert_eq!(ledgers[1].balance, 300);
        assert!(ledgers.iter().all(|l| l.session_id == session.id()));

        match session.action_log().entries().last() {
            Some(LogEntry::End { balances, .. }) => {
                assert_eq!(balances, vec![(ShortId::from(ids[0]), 300), (ShortId::from(ids[1]), 300)]);
            }
            other => panic!("expected end entry, got {other:?}"),
        }
    }

    #[test]
    fn test_mutation_after_end_is_rejected() {
        let session = GameSession::new(Uuid::new_v4(), 0, config());
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        for p in [p1, p2] {
            session.join(p).unwrap();
            session.buy_in(p, 500).unwrap();
        }
        session.start().unwrap();
        session.end().unwrap();

        let before = session.action_log();
        let cursor = session.next_card_index();
        assert_eq!(session.join(Uuid::new_v4()), Err(SessionError::AlreadyEnded));
        assert_eq!(session.choose_seat(p1, 2), Err(SessionError::AlreadyEnded));
        assert_eq!(session.buy_in(p1, 500), Err(SessionError::AlreadyEnded));
        assert_eq!(session.start_round(), Err(SessionError::AlreadyEnded));
        assert_eq!(session.add_action(p1, ActionCode::Check, 0), Err(SessionError::RoundNotActive));
        assert_eq!(session.quit(p1), Err(SessionError::AlreadyEnded));
        assert!(matches!(session.quit(Uuid::new_v4()), Err(SessionError::UnknownPlayer(_))));
        assert!(session.deal(3).is_empty());
        assert_eq!(session.next_card_index(), cursor);
        assert_eq!(session.action_log(), before);
        assert!(session.ended());
    }

    #[test]
    fn test_deal_before_start_is_empty() {
        let session = GameSession::new(Uuid::new_v4(), 2, config());
        assert!(session.deal(5).is_empty());
        assert!(session.deal_hands().is_empty());
        assert_eq!(session.next_card_index(), 0);
    }

    #[test]
    fn test_successor_session() {
        let session = GameSession::new(Uuid::new_v4(), 0, config());
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        session.join(p1).unwrap();
        session.join(p2).unwrap();
        session.choose_seat(p2, 1).unwrap();
        session.choose_seat(p1, 2).unwrap();

        let next = session.successor();
        assert_eq!(next.table_id(), session.table_id());
        assert_ne!(next.id(), session.id());
        assert_eq!(next.seating_order(), vec![p2, p1]);
        assert!(!next.started());
    }
}
