//! 胜率计算
//!
//! 对还没发出的公共牌做穷举：剩余牌堆中每一种补齐 5 张公共牌的组合都评估一次，
//! 牌力最强（`Strength` 最小）的手牌获胜，平局时平分这一份。结果是精确值，不是抽样。
//!
//! 翻牌前穷举 C(48, 5) 种组合，手牌多时开销很大，这里不做优化。

use crate::card::{Card, DECK_SIZE, EvalCard, ordered_sequence};
use crate::evaluator::{HandEvaluator, RankEvaluator};
use tracing::debug;

const BOARD_SIZE: usize = 5;

#[derive(Debug, Default, Clone)]
pub struct EquityCalculator<E = RankEvaluator> {
    evaluator: E,
}

impl<E: HandEvaluator> EquityCalculator<E> {
    pub fn new(evaluator: E) -> Self {
        EquityCalculator { evaluator }
    }

    /// 计算每手牌的胜率，返回值与 `hands` 一一对应。
    ///
    /// 公共牌超过 5 张，或者剩余的牌不够补齐时没有任何组合，所有胜率都是 0。
    pub fn calculate(&self, hands: &[[Card; 2]], board: &[Card]) -> Vec<f64> {
        let mut equities = vec![0.0; hands.len()];
        if hands.is_empty() {
            return equities;
        }
        let Some(need) = BOARD_SIZE.checked_sub(board.len()) else {
            debug!(board = board.len(), "公共牌过多，没有可枚举的组合");
            return equities;
        };

        let mut used = [false; DECK_SIZE + 1];
        for card in hands.iter().flatten().chain(board) {
            used[card.value() as usize] = true;
        }
        let remaining: Vec<EvalCard> = ordered_sequence()
            .into_iter()
            .filter(|card| !used[card.value() as usize])
            .map(EvalCard::from)
            .collect();

        // 每手牌的 7 张：2 张底牌 + 已知公共牌 + 待补的位置
        let mut sevens: Vec<[EvalCard; 7]> = hands
            .iter()
            .map(|hand| {
                let mut cards = [hand[0].to_eval(); 7];
                cards[1] = hand[1].to_eval();
                for (slot, card) in cards[2..].iter_mut().zip(board) {
                    *slot = card.to_eval();
                }
                cards
            })
            .collect();
        let fill_from = 2 + board.len();

        let mut strengths = Vec::with_capacity(hands.len());
        let mut combinations: u64 = 0;
        let mut iter = Combinations::new(remaining.len(), need);
        while let Some(picked) = iter.next_combination() {
            for cards in sevens.iter_mut() {
                for (slot, &i) in cards[fill_from..].iter_mut().zip(picked) {
                    *slot = remaining[i];
                }
            }
            strengths.clear();
            strengths.extend(sevens.iter().map(|cards| self.evaluator.evaluate(cards)));

            if let Some(best) = strengths.iter().min() {
                let winners = strengths.iter().filter(|s| *s == best).count();
                let share = 1.0 / winners as f64;
                for (equity, strength) in equities.iter_mut().zip(&strengths) {
                    if strength == best {
                        *equity += share;
                    }
                }
            }
            combinations += 1;
        }

        if combinations > 0 {
            for equity in equities.iter_mut() {
                *equity /= combinations as f64;
            }
        }
        debug!(hands = hands.len(), board = board.len(), combinations, "胜率计算完成");
        equities
    }
}

// --- 各阶段的便捷函数 ---

pub fn preflop(hands: &[[Card; 2]]) -> Vec<f64> {
    EquityCalculator::<RankEvaluator>::default().calculate(hands, &[])
}

pub fn flop(hands: &[[Card; 2]], board: &[Card; 3]) -> Vec<f64> {
    EquityCalculator::<RankEvaluator>::default().calculate(hands, board)
}

pub fn turn(hands: &[[Card; 2]], board: &[Card; 4]) -> Vec<f64> {
    EquityCalculator::<RankEvaluator>::default().calculate(hands, board)
}

pub fn river(hands: &[[Card; 2]], board: &[Card; 5]) -> Vec<f64> {
    EquityCalculator::<RankEvaluator>::default().calculate(hands, board)
}

/// 按下标升序（字典序）枚举 `pool` 个元素中取 `k` 个的全部组合。
///
/// 每次返回内部缓冲区的引用，不分配新的集合。
#[derive(Debug)]
struct Combinations {
    indices: Vec<usize>,
    pool: usize,
    started: bool,
}

impl Combinations {
    fn new(pool: usize, k: usize) -> Self {
        Combinations {
            indices: (0..k).collect(),
            pool,
            started: false,
        }
    }

    fn next_combination(&mut self) -> Option<&[usize]> {
        let k = self.indices.len();
        if !self.started {
            self.started = true;
            return (k <= self.pool).then_some(&self.indices[..]);
        }
        if k > self.pool {
            return None;
        }

        // 找到最右边还能往后移的位置
        let mut i = k;
        loop {
            if i == 0 {
                return None;
            }
            i -= 1;
            if self.indices[i] < self.pool - k + i {
                break;
            }
        }
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(&self.indices[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn card(value: u8) -> Card {
        Card::new(value).unwrap()
    }

    fn hand(a: u8, b: u8) -> [Card; 2] {
        [card(a), card(b)]
    }

    fn collect_all(pool: usize, k: usize) -> Vec<Vec<usize>> {
        let mut iter = Combinations::new(pool, k);
        let mut all = Vec::new();
        while let Some(c) = iter.next_combination() {
            all.push(c.to_vec());
        }
        all
    }

    #[test]
    fn test_combinations_are_ascending_and_complete() {
        let all = collect_all(5, 2);
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], vec![0, 1]);
        assert_eq!(all[1], vec![0, 2]);
        assert_eq!(all[9], vec![3, 4]);
        assert!(all.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(collect_all(44, 1).len(), 44);
        assert_eq!(collect_all(45, 2).len(), 990);
        // 公共牌已发完：只有一种（空）组合
        assert_eq!(collect_all(10, 0), vec![Vec::<usize>::new()]);
        assert!(collect_all(2, 3).is_empty());
    }

    #[test]
    fn test_preflop_aces_vs_kings() {
        // A♠ A♥ vs K♠ K♥
        let equities = preflop(&[hand(1, 14), hand(13, 26)]);
        assert_abs_diff_eq!(equities[0], 0.82, epsilon = 0.02);
        assert_abs_diff_eq!(equities[1], 0.18, epsilon = 0.02);
    }

    #[test]
    fn test_preflop_ace_king_vs_queens() {
        // A♠ K♠ vs Q♥ Q♦
        let equities = preflop(&[hand(1, 13), hand(25, 38)]);
        assert_abs_diff_eq!(equities[0], 0.46, epsilon = 0.02);
        assert_abs_diff_eq!(equities[1], 0.54, epsilon = 0.02);
    }

    #[test]
    fn test_flop_aces_vs_kings() {
        // 公共牌 2♣ 7♦ 9♥
        let equities = flop(&[hand(1, 14), hand(13, 26)], &[card(41), card(33), card(22)]);
        assert_abs_diff_eq!(equities[0], 0.91, epsilon = 0.02);
        assert_abs_diff_eq!(equities[1], 0.09, epsilon = 0.02);
        assert_abs_diff_eq!(equities.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_river_board_plays_splits_evenly() {
        // 公共牌是梅花皇家同花顺，两手牌都只能用公共牌
        let board = [card(40), card(52), card(51), card(50), card(49)];
        let equities = river(&[hand(2, 3), hand(15, 16)], &board);
        assert_abs_diff_eq!(equities[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(equities[1], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_turn_single_card_enumeration() {
        // A♠ A♥ vs K♠ K♥，公共牌 2♣ 7♦ 9♥ 4♣：只剩一张 K 能救
        let board = [card(41), card(33), card(22), card(43)];
        let equities = turn(&[hand(1, 14), hand(13, 26)], &board);
        assert_abs_diff_eq!(equities[1], 2.0 / 44.0, epsilon = 1e-9);
        assert_abs_diff_eq!(equities[0], 42.0 / 44.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_input_yields_zero() {
        let calculator = EquityCalculator::<RankEvaluator>::default();
        let six = [card(1), card(2), card(3), card(4), card(5), card(6)];
        assert_eq!(calculator.calculate(&[hand(20, 21), hand(30, 31)], &six), vec![0.0, 0.0]);
        assert!(calculator.calculate(&[], &[]).is_empty());
    }

    struct FirstCardEvaluator;

    impl HandEvaluator for FirstCardEvaluator {
        type Strength = u8;

        fn evaluate(&self, cards: &[EvalCard; 7]) -> u8 {
            cards[0].id()
        }
    }

    #[test]
    fn test_lower_strength_wins() {
        let calculator = EquityCalculator::new(FirstCardEvaluator);
        // 2♠ 的编码小于 A♠，第一手牌每次都赢
        let equities = calculator.calculate(&[hand(2, 20), hand(1, 30)], &[card(40), card(41), card(42)]);
        assert_eq!(equities, vec![1.0, 0.0]);
    }
}
