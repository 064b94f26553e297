use crate::error::CardError;
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- 核心数据结构定义 ---

/// 一副牌的张数
pub const DECK_SIZE: usize = 52;

/// 每种花色的点数个数
const RANKS_PER_SUIT: u8 = 13;

/// 花色 (Suit)
/// 顺序与显示编码一致：黑桃、红心、方块、梅花
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 ♠️
    Heart,   // 红心 ♥️
    Diamond, // 方块 ♦️
    Club,    // 梅花 ♣️
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Diamond, Suit::Club];

    pub fn from_index(index: u8) -> Option<Suit> {
        Self::ALL.get(index as usize).copied()
    }
}

/// 点数 (Rank)
/// 判定牌力时 Ace 是最大的，Ord 的派生让 Ace 排在最后
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];

    /// 按牌力顺序的索引 (Two = 0, Ace = 12)
    pub fn from_index(index: u8) -> Option<Rank> {
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "T",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        })
    }
}

/// 单张扑克牌的显示编码 (1-52)
///
/// 花色优先：`(card - 1) / 13` 是花色，`(card - 1) % 13` 是点数，
/// 其中 A 的点数是 0，K 是 12。这是牌序列、动作日志和展示层使用的编码。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Card(u8);

impl Card {
    pub fn new(value: u8) -> Result<Card, CardError> {
        if (1..=DECK_SIZE as u8).contains(&value) {
            Ok(Card(value))
        } else {
            Err(CardError::OutOfRange(value))
        }
    }

    pub fn from_parts(rank: Rank, suit: Suit) -> Card {
        // 显示编码中 A 排在最前
        let display_rank = match rank {
            Rank::Ace => 0,
            other => other as u8 + 1,
        };
        Card(suit as u8 * RANKS_PER_SUIT + display_rank + 1)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn suit(self) -> Suit {
        Suit::ALL[((self.0 - 1) / RANKS_PER_SUIT) as usize]
    }

    pub fn rank(self) -> Rank {
        match (self.0 - 1) % RANKS_PER_SUIT {
            0 => Rank::Ace,
            r => Rank::ALL[(r - 1) as usize],
        }
    }

    /// 转换为牌力评估器使用的编码
    pub fn to_eval(self) -> EvalCard {
        EvalCard::new(self.rank(), self.suit())
    }
}

impl TryFrom<u8> for Card {
    type Error = CardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Card::new(value)
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> u8 {
        card.0
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 牌力评估器使用的紧凑编码
///
/// 点数在高位（Two = 0 ... Ace = 12），花色在低两位：`(rank << 2) | suit`。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct EvalCard(u8);

impl EvalCard {
    pub fn new(rank: Rank, suit: Suit) -> EvalCard {
        EvalCard(((rank as u8) << 2) | suit as u8)
    }

    pub fn from_id(id: u8) -> Option<EvalCard> {
        Rank::from_index(id >> 2).map(|_| EvalCard(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn rank(self) -> Rank {
        Rank::ALL[(self.0 >> 2) as usize]
    }

    pub fn suit(self) -> Suit {
        Suit::ALL[(self.0 & 0b11) as usize]
    }
}

impl From<Card> for EvalCard {
    fn from(card: Card) -> Self {
        card.to_eval()
    }
}

impl From<EvalCard> for Card {
    fn from(card: EvalCard) -> Self {
        Card::from_parts(card.rank(), card.suit())
    }
}

// --- 牌序列生成 ---

/// 按显示编码顺序排列的整副牌 (1..=52)
pub fn ordered_sequence() -> Vec<Card> {
    (1..=DECK_SIZE as u8).map(Card).collect()
}

/// 洗好的一副牌（均匀随机排列）
pub fn shuffled_sequence<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = ordered_sequence();
    deck.shuffle(rng);
    deck
}

// --- 单元测试 ---
