//! 下注合法性校验
//!
//! 重放一份已经结束的动作日志，按无限注规则检查开始和结束标记之间的每一个玩家动作。
//! 校验是纯函数，不修改日志，也不依赖任何牌局状态。

use crate::action_log::{ActionCode, ActionLog, LogEntry, ShortId, is_end_line, is_start_line};
use crate::error::{ValidationError, Violation};
use crate::state::Chips;
use std::collections::HashMap;

/// 校验动作日志
///
/// `stacks` 是可选的初始筹码表，以 8 位短 ID 为键；给出时还会检查每次加注和跟注是否付得起。
/// 失败时返回出错条目的下标、原始文本和违反的规则。
pub fn validate(log: &ActionLog, stacks: Option<&HashMap<ShortId, Chips>>) -> Result<(), ValidationError> {
    let lines = log.lines();
    if lines.len() < 2 {
        return Err(ValidationError::LogTooShort);
    }
    let start = lines.iter().position(|line| is_start_line(line)).ok_or(ValidationError::MissingStart)?;
    if !lines.last().is_some_and(|line| is_end_line(line)) {
        return Err(ValidationError::MissingEnd);
    }

    let big_blind = match lines[start].parse::<LogEntry>() {
        Ok(LogEntry::Start { big_blind, .. }) => big_blind,
        Ok(_) => return Err(located(start, &lines[start], Violation::UnexpectedMarker)),
        Err(err) => return Err(located(start, &lines[start], err.into())),
    };

    let mut replay = BettingReplay::new(big_blind, stacks.cloned().unwrap_or_default());
    let end = lines.len() - 1;
    for (index, line) in lines.iter().enumerate().take(end).skip(start + 1) {
        let entry = line.parse::<LogEntry>().map_err(|err| located(index, line, err.into()))?;
        replay.apply(entry).map_err(|violation| located(index, line, violation))?;
    }
    Ok(())
}

fn located(index: usize, line: &str, violation: Violation) -> ValidationError {
    ValidationError::Entry {
        index,
        entry: line.to_string(),
        violation,
    }
}

/// 重放过程中的下注状态
#[derive(Debug)]
struct BettingReplay {
    current_bet: Chips,
    last_raise_delta: Chips,           // 最小加注幅度
    player_bets: HashMap<ShortId, Chips>,
    stacks: HashMap<ShortId, Chips>,   // 只包含已知初始筹码的玩家
}

impl BettingReplay {
    fn new(big_blind: Chips, stacks: HashMap<ShortId, Chips>) -> Self {
        BettingReplay {
            current_bet: big_blind,
            last_raise_delta: big_blind,
            player_bets: HashMap::new(),
            stacks,
        }
    }

    /// 重放一个条目，只有玩家动作会改变下注状态
    fn apply(&mut self, entry: LogEntry) -> Result<(), Violation> {
        let (player, code, amount) = match entry {
            LogEntry::Action { player, code, amount, .. } => (player, code, amount),
            LogEntry::Start { .. } | LogEntry::End { .. } => return Err(Violation::UnexpectedMarker),
            LogEntry::Malformed(raw) => return Err(Violation::Unparsed(raw)),
        };
        let committed = self.player_bets.get(&player).copied().unwrap_or(0);

        match code {
            ActionCode::Raise => {
                if amount <= self.current_bet {
                    return Err(Violation::RaiseBelowCurrentBet);
                }
                let delta = amount - self.current_bet;
                if delta < self.last_raise_delta {
                    return Err(Violation::RaiseTooSmall);
                }
                self.debit(&player, amount.saturating_sub(committed), Violation::InsufficientChipsToRaise)?;
                self.player_bets.insert(player, amount);
                self.current_bet = amount;
                self.last_raise_delta = delta;
            }
            ActionCode::Check if committed < self.current_bet => {
                // 跟注
                if amount != self.current_bet {
                    return Err(Violation::CallAmountMismatch);
                }
                self.debit(&player, self.current_bet - committed, Violation::InsufficientChipsToCall)?;
                self.player_bets.insert(player, self.current_bet);
            }
            ActionCode::Check => {
                if amount != 0 {
                    return Err(Violation::CheckAmountNonZero);
                }
            }
            ActionCode::AllIn => {
                let need = amount.saturating_sub(committed);
                if let Some(stack) = self.stacks.get_mut(&player) {
                    if need != *stack {
                        return Err(Violation::AllInAmountMismatch);
                    }
                    *stack = 0;
                }
                if amount > self.current_bet {
                    let delta = amount - self.current_bet;
                    if delta < self.last_raise_delta {
                        return Err(Violation::AllInRaiseTooSmall);
                    }
                    self.current_bet = amount;
                    self.last_raise_delta = delta;
                }
                self.player_bets.insert(player, committed + need);
            }
            ActionCode::Fold => {
                if amount != 0 {
                    return Err(Violation::FoldAmountNonZero);
                }
                self.player_bets.insert(player, 0);
            }
            ActionCode::Join | ActionCode::Quit | ActionCode::Seat => {}
            ActionCode::Straddle | ActionCode::RunTwice | ActionCode::BuyIn => {
                return Err(Violation::UnexpectedAction(code));
            }
        }
        Ok(())
    }

    /// 已知筹码的玩家扣除 `need`，不够时返回 `violation`
    fn debit(&mut self, player: &ShortId, need: Chips, violation: Violation) -> Result<(), Violation> {
        if let Some(stack) = self.stacks.get_mut(player) {
            if need > *stack {
                return Err(violation);
            }
            *stack -= need;
        }
        Ok(())
    }
}
