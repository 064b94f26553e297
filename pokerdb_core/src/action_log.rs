//! 动作日志的文本编码
//!
//! 动作日志是牌局唯一持久化的历史记录，每个条目是一行紧凑文本：
//!
//! - 开始: `G:<小盲>:<大盲>:<前注>:<两次发牌 0/1>:<抓盲 0/1>,<unix 时间戳>`
//! - 结束: `E:<id8>=<余额>:<id8>=<余额>...,<unix 时间戳>`
//! - 玩家动作: `<id8><动作代码><金额>,<unix 时间戳>`
//!
//! `id8` 是玩家 ID 的前 8 个字符。解码得到一个封闭的 `LogEntry` 枚举，
//! 所有使用方都对它做穷尽匹配，而不是再去猜字符串的形状。

use crate::error::DecodeError;
use crate::state::{Chips, PlayerId};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// unix 时间戳（秒）
pub type Timestamp = i64;

const START_PREFIX: &str = "G:";
const END_PREFIX: &str = "E:";
const SHORT_ID_LEN: usize = 8;

/// 单字符动作代码
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum ActionCode {
    Raise,    // R 加注
    Fold,     // F 弃牌
    Check,    // C 过牌或跟注
    AllIn,    // A 全下
    Straddle, // S 抓盲
    RunTwice, // T 选择发两次/一次
    BuyIn,    // B 买入
    Join,     // J 入座
    Quit,     // Q 离开
    Seat,     // P 选座（金额为座位号）
}

impl ActionCode {
    pub const ALL: [ActionCode; 10] = [
        ActionCode::Raise, ActionCode::Fold, ActionCode::Check, ActionCode::AllIn,
        ActionCode::Straddle, ActionCode::RunTwice, ActionCode::BuyIn,
        ActionCode::Join, ActionCode::Quit, ActionCode::Seat,
    ];

    pub fn as_char(self) -> char {
        match self {
            ActionCode::Raise => 'R',
            ActionCode::Fold => 'F',
            ActionCode::Check => 'C',
            ActionCode::AllIn => 'A',
            ActionCode::Straddle => 'S',
            ActionCode::RunTwice => 'T',
            ActionCode::BuyIn => 'B',
            ActionCode::Join => 'J',
            ActionCode::Quit => 'Q',
            ActionCode::Seat => 'P',
        }
    }

    pub fn from_char(c: char) -> Option<ActionCode> {
        Self::ALL.into_iter().find(|code| code.as_char() == c)
    }

    /// 展示用的完整单词
    pub fn word(self) -> &'static str {
        match self {
            ActionCode::Raise => "raise",
            ActionCode::Fold => "fold",
            ActionCode::Check => "check",
            ActionCode::AllIn => "all-in",
            ActionCode::Straddle => "straddle",
            ActionCode::RunTwice => "run-twice",
            ActionCode::BuyIn => "buy-in",
            ActionCode::Join => "join",
            ActionCode::Quit => "quit",
            ActionCode::Seat => "seat",
        }
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// 日志中使用的截断玩家 ID（前 8 个字符）
///
/// 必须正好 8 个字符，且不含日志的分隔符 `:` `=` `,`，否则编码后无法解码回来。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortId(String);

impl ShortId {
    pub fn new(id: &str) -> Result<ShortId, DecodeError> {
        let valid = id.chars().count() == SHORT_ID_LEN && !id.contains([':', '=', ',']);
        if valid {
            Ok(ShortId(id.to_string()))
        } else {
            Err(DecodeError::BadShortId(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShortId {
    type Error = DecodeError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        ShortId::new(&id)
    }
}

impl From<ShortId> for String {
    fn from(id: ShortId) -> String {
        id.0
    }
}

impl From<PlayerId> for ShortId {
    fn from(id: PlayerId) -> Self {
        // UUID 的前 8 位都是十六进制字符
        ShortId(id.simple().to_string()[..SHORT_ID_LEN].to_string())
    }
}

impl From<&PlayerId> for ShortId {
    fn from(id: &PlayerId) -> Self {
        ShortId::from(*id)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一条动作日志
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LogEntry {
    Start {
        small_blind: Chips,
        big_blind: Chips,
        ante: Chips,
        run_it_twice: bool,
        straddle: bool,
        timestamp: Timestamp,
    },
    Action {
        player: ShortId,
        code: ActionCode,
        amount: Chips,
        timestamp: Timestamp,
    },
    End {
        balances: Vec<(ShortId, Chips)>,
        timestamp: Timestamp,
    },
    /// 无法解析的原始文本，展示时原样输出
    Malformed(String),
}

impl LogEntry {
    pub fn encode(&self) -> String {
        match self {
            LogEntry::Start { small_blind, big_blind, ante, run_it_twice, straddle, timestamp } => format!(
                "{START_PREFIX}{small_blind}:{big_blind}:{ante}:{}:{},{timestamp}",
                u8::from(*run_it_twice),
                u8::from(*straddle),
            ),
            LogEntry::Action { player, code, amount, timestamp } => {
                format!("{player}{code}{amount},{timestamp}")
            }
            LogEntry::End { balances, timestamp } => {
                let pairs: Vec<String> = balances.iter().map(|(id, bal)| format!("{id}={bal}")).collect();
                format!("{END_PREFIX}{},{timestamp}", pairs.join(":"))
            }
            LogEntry::Malformed(raw) => raw.clone(),
        }
    }

    /// 宽松解码：无法解析的行变成 `Malformed`，永不失败
    pub fn decode(line: &str) -> LogEntry {
        line.parse().unwrap_or_else(|_| LogEntry::Malformed(line.to_string()))
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            LogEntry::Start { timestamp, .. }
            | LogEntry::Action { timestamp, .. }
            | LogEntry::End { timestamp, .. } => Some(*timestamp),
            LogEntry::Malformed(_) => None,
        }
    }

    /// 人类可读的一行描述
    pub fn render(&self) -> String {
        match self {
            LogEntry::Start { small_blind, big_blind, ante, run_it_twice, straddle, timestamp } => format!(
                "start sb={small_blind} bb={big_blind} ante={ante} runTwice={} straddle={} at {}",
                u8::from(*run_it_twice),
                u8::from(*straddle),
                format_timestamp(*timestamp),
            ),
            LogEntry::Action { player, code, amount, timestamp } => {
                format!("{player} {} {amount} at {}", code.word(), format_timestamp(*timestamp))
            }
            LogEntry::End { balances, timestamp } => {
                let pairs: Vec<String> = balances.iter().map(|(id, bal)| format!("{id}={bal}")).collect();
                format!("result [{}] at {}", pairs.join(" "), format_timestamp(*timestamp))
            }
            LogEntry::Malformed(raw) => raw.clone(),
        }
    }
}

impl FromStr for LogEntry {
    type Err = DecodeError;

    /// 严格解码，校验器用它得到具体的格式错误
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (body, ts) = line.split_once(',').ok_or(DecodeError::MissingTimestamp)?;
        let timestamp: Timestamp = ts.parse().map_err(|_| DecodeError::BadTimestamp)?;

        if let Some(fields) = body.strip_prefix(START_PREFIX) {
            let fields: Vec<&str> = fields.split(':').collect();
            let [sb, bb, ante, run_twice, straddle] = fields.as_slice() else {
                return Err(DecodeError::MissingFields);
            };
            return Ok(LogEntry::Start {
                small_blind: parse_chips(sb)?,
                big_blind: parse_chips(bb)?,
                ante: parse_chips(ante)?,
                run_it_twice: parse_flag(run_twice)?,
                straddle: parse_flag(straddle)?,
                timestamp,
            });
        }

        if let Some(pairs) = body.strip_prefix(END_PREFIX) {
            let balances = pairs
                .split(':')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (id, bal) = pair.split_once('=').ok_or_else(|| DecodeError::BadLedgerPair(pair.to_string()))?;
                    Ok((ShortId::new(id)?, parse_chips(bal)?))
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            return Ok(LogEntry::End { balances, timestamp });
        }

        // 玩家动作：8 个字符的 ID，1 个字符的代码，剩下是金额
        let (code_at, code_char) = body.char_indices().nth(SHORT_ID_LEN).ok_or(DecodeError::ShortBody)?;
        let code = ActionCode::from_char(code_char).ok_or(DecodeError::UnknownAction(code_char))?;
        let amount = parse_chips(&body[code_at + code_char.len_utf8()..])?;
        Ok(LogEntry::Action {
            player: ShortId::new(&body[..code_at])?,
            code,
            amount,
            timestamp,
        })
    }
}

fn parse_chips(s: &str) -> Result<Chips, DecodeError> {
    s.parse().map_err(|_| DecodeError::BadNumber(s.to_string()))
}

fn parse_flag(s: &str) -> Result<bool, DecodeError> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(DecodeError::BadNumber(other.to_string())),
    }
}

fn format_timestamp(ts: Timestamp) -> String {
    DateTime::from_timestamp(ts, 0).map_or_else(|| ts.to_string(), |t| t.to_rfc3339())
}

/// 以开始标记开头的行（不检查其余内容）
pub(crate) fn is_start_line(line: &str) -> bool {
    line.starts_with(START_PREFIX)
}

pub(crate) fn is_end_line(line: &str) -> bool {
    line.starts_with(END_PREFIX)
}

/// 只追加的动作日志，按原样保存编码后的字符串
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog(Vec<String>);

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: &LogEntry) {
        self.0.push(entry.encode());
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = LogEntry> + '_ {
        self.0.iter().map(|line| LogEntry::decode(line))
    }

    pub fn render(&self) -> Vec<String> {
        self.entries().map(|entry| entry.render()).collect()
    }
}

impl From<Vec<String>> for ActionLog {
    fn from(lines: Vec<String>) -> Self {
        ActionLog(lines)
    }
}

// --- 单元测试 ---
