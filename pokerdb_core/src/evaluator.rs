use crate::card::{EvalCard, Rank};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

/// 七张牌的牌力评估接口
///
/// 胜率计算只通过这个接口使用评估器。`Strength` 必须是全序的，
/// 并且约定 **数值越小越强**：同一组公共牌下 `Strength` 最小的手牌获胜，
/// 相等即平分。
pub trait HandEvaluator {
    type Strength: Ord;

    fn evaluate(&self, cards: &[EvalCard; 7]) -> Self::Strength;
}

/// 内置评估器：计算 `HandRank`，再用 `Reverse` 翻转方向，
/// 使更强的牌型比较起来更小。
#[derive(Debug, Default, Clone, Copy)]
pub struct RankEvaluator;

impl HandEvaluator for RankEvaluator {
    type Strength = Reverse<HandRank>;

    fn evaluate(&self, cards: &[EvalCard; 7]) -> Self::Strength {
        Reverse(rank_hand(cards))
    }
}

/// 牌型等级 (HandRank)
/// 1. 变体按从小到大排列，可以直接利用 `Ord` 进行比较。
/// 2. 变体内部存储了比较所需的所有信息（例如对子的大小、三条的大小、踢脚牌等）。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum HandRank {
    HighCard(Rank, Rank, Rank, Rank, Rank),          // 高牌
    OnePair(Rank, Rank, Rank, Rank),                 // 一对
    TwoPair(Rank, Rank, Rank),                       // 两对
    ThreeOfAKind(Rank, Rank, Rank),                  // 三条
    Straight(Rank),                                  // 顺子 (最高牌的点数)
    Flush(Rank, Rank, Rank, Rank, Rank),             // 同花
    FullHouse(Rank, Rank),                           // 葫芦 (三条的点数, 对子的点数)
    FourOfAKind(Rank, Rank),                         // 四条 (四条的点数, 踢脚牌)
    StraightFlush(Rank),                             // 同花顺 (最高牌的点数)
    RoyalFlush,                                      // 皇家同花顺
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            HandRank::HighCard(..) => "高牌".to_string(),
            HandRank::OnePair(r1, ..) => format!("一对({})", r1),
            HandRank::TwoPair(r1, r2, ..) => format!("两对({},{})", r1, r2),
            HandRank::ThreeOfAKind(r1, ..) => format!("三条({})", r1),
            HandRank::Straight(..) => "顺子".to_string(),
            HandRank::Flush(..) => "同花".to_string(),
            HandRank::FullHouse(..) => "葫芦".to_string(),
            HandRank::FourOfAKind(..) => "四条".to_string(),
            HandRank::StraightFlush(..) => "同花顺".to_string(),
            HandRank::RoyalFlush => "皇家同花顺".to_string(),
        })
    }
}

// --- 牌型评估逻辑 ---

const WHEEL: u16 = 0b1_0000_0000_1111; // A-2-3-4-5

/// 从 5 到 7 张牌中找出最优的 5 张牌组合牌力
///
/// 不枚举组合：按点数计数和每种花色的点数位图直接判定。
/// 7 张牌里一旦有同花，就不可能同时组成四条或葫芦，所以同花最先判断。
pub fn rank_hand(cards: &[EvalCard]) -> HandRank {
    debug_assert!((5..=7).contains(&cards.len()), "牌数必须在5到7张之间");

    let mut counts = [0u8; 13];
    let mut suit_masks = [0u16; 4];
    let mut all_mask = 0u16;
    for card in cards {
        let rank = card.rank() as usize;
        counts[rank] += 1;
        suit_masks[card.suit() as usize] |= 1 << rank;
        all_mask |= 1 << rank;
    }

    // 1. 同花和同花顺
    if let Some(&flush_mask) = suit_masks.iter().find(|m| m.count_ones() >= 5) {
        return match straight_high(flush_mask) {
            Some(Rank::Ace) => HandRank::RoyalFlush,
            Some(high) => HandRank::StraightFlush(high),
            None => {
                let [a, b, c, d, e] = top_ranks::<5>(flush_mask, None);
                HandRank::Flush(a, b, c, d, e)
            }
        };
    }

    // 2. 按出现次数找四条、三条和对子，点数从大到小
    let mut quad = None;
    let (mut trips, mut trip_count) = ([Rank::Two; 2], 0);
    let (mut pairs, mut pair_count) = ([Rank::Two; 3], 0);
    for rank in Rank::ALL.iter().rev() {
        match counts[*rank as usize] {
            4 => quad = Some(*rank),
            3 => {
                trips[trip_count] = *rank;
                trip_count += 1;
            }
            2 => {
                pairs[pair_count] = *rank;
                pair_count += 1;
            }
            _ => {}
        }
    }
    let trips = &trips[..trip_count];
    let pairs = &pairs[..pair_count];

    if let Some(q) = quad {
        let [kicker] = top_ranks::<1>(all_mask, Some(1 << q as u16));
        return HandRank::FourOfAKind(q, kicker);
    }

    if let Some(&t) = trips.first() {
        // 第二个三条也可以当作对子使用
        let pair = trips.get(1).copied().into_iter().chain(pairs.first().copied()).max();
        if let Some(p) = pair {
            return HandRank::FullHouse(t, p);
        }
    }

    if let Some(high) = straight_high(all_mask) {
        return HandRank::Straight(high);
    }

    if let Some(&t) = trips.first() {
        let [k1, k2] = top_ranks::<2>(all_mask, Some(1 << t as u16));
        return HandRank::ThreeOfAKind(t, k1, k2);
    }

    match pairs {
        [p1, p2, ..] => {
            let exclude = (1 << *p1 as u16) | (1 << *p2 as u16);
            let [kicker] = top_ranks::<1>(all_mask, Some(exclude));
            HandRank::TwoPair(*p1, *p2, kicker)
        }
        [p] => {
            let [k1, k2, k3] = top_ranks::<3>(all_mask, Some(1 << *p as u16));
            HandRank::OnePair(*p, k1, k2, k3)
        }
        [] => {
            let [a, b, c, d, e] = top_ranks::<5>(all_mask, None);
            HandRank::HighCard(a, b, c, d, e)
        }
    }
}

/// 点数位图中最大的顺子的最高牌
fn straight_high(mask: u16) -> Option<Rank> {
    for high in (4..13u8).rev() {
        let window = 0b1_1111u16 << (high - 4);
        if mask & window == window {
            return Rank::from_index(high);
        }
    }
    // A-5 顺子中，5是最大的牌
    (mask & WHEEL == WHEEL).then_some(Rank::Five)
}

/// 从位图中按从大到小取出 N 个点数，跳过 `exclude` 中的点数
fn top_ranks<const N: usize>(mask: u16, exclude: Option<u16>) -> [Rank; N] {
    let mask = mask & !exclude.unwrap_or(0);
    let mut out = [Rank::Two; N];
    let mut filled = 0;
    for rank in Rank::ALL.iter().rev() {
        if filled == N {
            break;
        }
        if mask & (1 << *rank as u16) != 0 {
            out[filled] = *rank;
            filled += 1;
        }
    }
    out
}

// --- 单元测试 ---
