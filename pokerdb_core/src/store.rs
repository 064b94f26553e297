//! 牌局记录的存储接口
//!
//! 存储层只保存 `SessionState` 中持久化的字段（序列化时跳过运行时字段），
//! 动作日志作为有序的字符串列表原样保存。

use crate::error::StoreError;
use crate::state::{SessionId, SessionState, TableId};
use dashmap::DashMap;
use tracing::debug;

pub trait SessionStore {
    /// 保存或覆盖一条牌局记录
    fn save(&self, state: &SessionState) -> Result<(), StoreError>;

    fn load(&self, id: SessionId) -> Result<SessionState, StoreError>;

    /// 同一张桌子上的所有牌局，按开始时间排序，未开始的排在最前
    fn list_for_table(&self, table_id: TableId) -> Result<Vec<SessionState>, StoreError>;
}

/// 内存中的存储，记录以 JSON 文本保存
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.sessions.insert(state.id, json);
        debug!(session = %state.id, "牌局记录已保存");
        Ok(())
    }

    fn load(&self, id: SessionId) -> Result<SessionState, StoreError> {
        let json = self.sessions.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(serde_json::from_str(json.value())?)
    }

    fn list_for_table(&self, table_id: TableId) -> Result<Vec<SessionState>, StoreError> {
        let mut states = Vec::new();
        for entry in self.sessions.iter() {
            let state: SessionState = serde_json::from_str(entry.value())?;
            if state.table_id == table_id {
                states.push(state);
            }
        }
        states.sort_by_key(|s| s.started_at);
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::ActionCode;
    use crate::config::SessionConfig;
    use crate::session::GameSession;
    use uuid::Uuid;

    fn finished_session(table_id: TableId) -> GameSession {
        let config = SessionConfig {
            small_blind: 10,
            big_blind: 20,
            ante: 5,
            allow_straddle: true,
            min_buy_in: 100,
            ..Default::default()
        };
        let session = GameSession::new(table_id, 2, config);
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        session.buy_in(p1, 500).unwrap();
        session.buy_in(p2, 800).unwrap();
        session.start().unwrap();
        session.add_action(p1, ActionCode::Raise, 60).unwrap();
        session.add_action(p2, ActionCode::Fold, 0).unwrap();
        session.end().unwrap();
        session
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        let session = finished_session(Uuid::new_v4());
        let state = session.snapshot();
        store.save(&state).unwrap();

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.table_id, state.table_id);
        assert_eq!(loaded.card_sequence, state.card_sequence);
        assert_eq!(loaded.started_at, state.started_at);
        assert_eq!(loaded.ended_at, state.ended_at);
        assert_eq!(loaded.person_count, 2);
        assert_eq!(loaded.config, state.config);
        assert_eq!(loaded.buy_ins, state.buy_ins);
        assert_eq!(loaded.action_log, state.action_log);
        assert_eq!(loaded.ledgers, state.ledgers);
        // 运行时字段不保存
        assert!(loaded.stacks.is_empty());
        assert!(!loaded.in_round);

        let restored = GameSession::from_state(loaded);
        assert!(restored.ended());
        assert_eq!(restored.action_strings(), session.action_strings());
    }

    #[test]
    fn test_load_missing_session() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.load(id), Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn test_list_for_table() {
        let store = MemoryStore::new();
        let table = Uuid::new_v4();
        let first = finished_session(table);
        let next = first.successor();
        store.save(&first.snapshot()).unwrap();
        store.save(&next.snapshot()).unwrap();
        store.save(&finished_session(Uuid::new_v4()).snapshot()).unwrap();
        // 重复保存覆盖同一条记录
        store.save(&first.snapshot()).unwrap();
        assert_eq!(store.len(), 3);

        let listed = store.list_for_table(table).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, next.id());
        assert_eq!(listed[1].id, first.id());
    }
}
