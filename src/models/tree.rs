//! Регрессионное дерево для бустинга
//!
//! Рост по листьям (leaf-wise): на каждом шаге делится лист с наибольшим
//! приростом, пока не достигнуто `num_leaves`. Разбиения ищутся по гистограммам
//! корзин. Выход листа: -T(G) / (H + lambda), где T - мягкий порог L1.

#![allow(non_snake_case)]

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::binning::{BinMapper, BinnedMatrix, MISSING_BIN};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitRule {
    /// value <= threshold -> влево
    Numeric { threshold: f64, missing_left: bool },
    /// Перечисленные уровни -> влево; остальные, пропуски и новые уровни -> вправо
    Categorical { left_levels: Vec<u32> },
}

impl SplitRule {
    fn goes_left(&self, value: f64) -> bool {
        if value.is_nan() {
            return matches!(self, SplitRule::Numeric { missing_left: true, .. });
        }
        match self {
            SplitRule::Numeric { threshold, .. } => value <= *threshold,
            SplitRule::Categorical { left_levels } => {
                value >= 0.0 && left_levels.contains(&(value as u32))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        gain: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    rule,
                    left,
                    right,
                    ..
                } => {
                    idx = if rule.goes_left(row[*feature]) { *left } else { *right };
                }
            }
        }
    }

    /// Умножение выходов листьев (shrinkage)
    pub fn scale(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// (признак, прирост) для каждого разбиения
    pub fn split_gains(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            Node::Split { feature, gain, .. } => Some((*feature, *gain)),
            Node::Leaf { .. } => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
}

impl TreeParams {
    fn threshold_l1(&self, g: f64) -> f64 {
        g.signum() * (g.abs() - self.reg_alpha).max(0.0)
    }

    fn score(&self, s: &Stats) -> f64 {
        let denom = s.h + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        self.threshold_l1(s.g).powi(2) / denom
    }

    fn leaf_output(&self, s: &Stats) -> f64 {
        let denom = s.h + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.threshold_l1(s.g) / denom
    }
}

/// Суммы градиентов и гессианов корзины
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    g: f64,
    h: f64,
    count: usize,
}

impl Stats {
    fn add(&mut self, other: &Stats) {
        self.g += other.g;
        self.h += other.h;
        self.count += other.count;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            g: self.g - other.g,
            h: self.h - other.h,
            count: self.count - other.count,
        }
    }
}

#[derive(Debug, Clone)]
enum BinRule {
    Numeric { bin: usize, missing_left: bool },
    Categorical { left: Vec<u16> },
}

impl BinRule {
    fn goes_left(&self, bin: u16) -> bool {
        match self {
            BinRule::Numeric { bin: b, missing_left } => {
                if bin == MISSING_BIN {
                    *missing_left
                } else {
                    bin as usize <= *b
                }
            }
            BinRule::Categorical { left } => bin != MISSING_BIN && left.contains(&bin),
        }
    }

    fn to_rule(&self, mapper: &BinMapper) -> SplitRule {
        match self {
            BinRule::Numeric { bin, missing_left } => SplitRule::Numeric {
                threshold: mapper.threshold(*bin),
                missing_left: *missing_left,
            },
            BinRule::Categorical { left } => {
                let mut left_levels: Vec<u32> = left.iter().map(|b| *b as u32).collect();
                left_levels.sort_unstable();
                SplitRule::Categorical { left_levels }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    feature: usize,
    gain: f64,
    rule: BinRule,
    left: Stats,
    right: Stats,
}

struct Leaf {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    best: Option<Candidate>,
}

pub struct TreeBuilder<'a> {
    data: &'a BinnedMatrix,
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: &'a TreeParams,
    features: &'a [usize],
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        data: &'a BinnedMatrix,
        gradients: &'a [f64],
        hessians: &'a [f64],
        params: &'a TreeParams,
        features: &'a [usize],
    ) -> Self {
        Self {
            data,
            gradients,
            hessians,
            params,
            features,
        }
    }

    fn stats(&self, rows: &[usize]) -> Stats {
        let mut s = Stats::default();
        for &r in rows {
            s.g += self.gradients[r];
            s.h += self.hessians[r];
            s.count += 1;
        }
        s
    }

    pub fn build(&self, rows: Vec<usize>) -> Tree {
        let root = self.stats(&rows);
        let mut nodes = vec![Node::Leaf {
            value: self.params.leaf_output(&root),
        }];
        let best = self.find_best_split(&rows, &root, 0);
        let mut leaves = vec![Leaf {
            node: 0,
            rows,
            depth: 0,
            best,
        }];
        let mut n_leaves = 1;

        while n_leaves < self.params.num_leaves {
            let pick = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, l)| l.best.as_ref().map(|b| (i, b.gain)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i);
            let Some(pick) = pick else { break };

            let leaf = leaves.swap_remove(pick);
            let Some(split) = leaf.best else { break };

            let bins = &self.data.bins[split.feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
                .rows
                .iter()
                .partition(|&&r| split.rule.goes_left(bins[r]));

            let left = nodes.len();
            nodes.push(Node::Leaf {
                value: self.params.leaf_output(&split.left),
            });
            let right = nodes.len();
            nodes.push(Node::Leaf {
                value: self.params.leaf_output(&split.right),
            });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                rule: split.rule.to_rule(&self.data.mappers[split.feature]),
                gain: split.gain,
                left,
                right,
            };
            n_leaves += 1;

            let depth = leaf.depth + 1;
            for (node, rows, stats) in [(left, left_rows, split.left), (right, right_rows, split.right)] {
                let best = self.find_best_split(&rows, &stats, depth);
                leaves.push(Leaf {
                    node,
                    rows,
                    depth,
                    best,
                });
            }
        }

        Tree { nodes }
    }

    fn find_best_split(&self, rows: &[usize], total: &Stats, depth: usize) -> Option<Candidate> {
        let min_child = self.params.min_child_samples.max(1);
        if self.params.max_depth.map_or(false, |d| depth >= d) || rows.len() < 2 * min_child {
            return None;
        }
        let parent_score = self.params.score(total);

        let mut best: Option<Candidate> = None;
        for &feature in self.features {
            let mapper = &self.data.mappers[feature];
            let bins = &self.data.bins[feature];

            let mut hist = vec![Stats::default(); mapper.n_bins()];
            let mut missing = Stats::default();
            for &r in rows {
                let s = Stats {
                    g: self.gradients[r],
                    h: self.hessians[r],
                    count: 1,
                };
                match bins[r] {
                    MISSING_BIN => missing.add(&s),
                    b => hist[b as usize].add(&s),
                }
            }

            let candidate = match mapper {
                BinMapper::Numeric { .. } => {
                    self.best_numeric(feature, &hist, &missing, total, parent_score, min_child)
                }
                BinMapper::Categorical { .. } => {
                    self.best_categorical(feature, &hist, total, parent_score, min_child)
                }
            };
            if let Some(c) = candidate {
                if best.as_ref().map_or(true, |b| c.gain > b.gain) {
                    best = Some(c);
                }
            }
        }
        best
    }

    fn best_numeric(
        &self,
        feature: usize,
        hist: &[Stats],
        missing: &Stats,
        total: &Stats,
        parent_score: f64,
        min_child: usize,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let directions: &[bool] = if missing.count > 0 { &[false, true] } else { &[false] };

        for &missing_left in directions {
            let mut left = if missing_left { *missing } else { Stats::default() };
            for (bin, s) in hist.iter().enumerate().take(hist.len().saturating_sub(1)) {
                left.add(s);
                if left.count < min_child {
                    continue;
                }
                let right = total.minus(&left);
                if right.count < min_child {
                    break;
                }
                let gain = self.params.score(&left) + self.params.score(&right) - parent_score;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        gain,
                        rule: BinRule::Numeric { bin, missing_left },
                        left,
                        right,
                    });
                }
            }
        }
        best
    }

    /// Уровни сортируются по g/h, разбиение ищется среди префиксов порядка
    fn best_categorical(
        &self,
        feature: usize,
        hist: &[Stats],
        total: &Stats,
        parent_score: f64,
        min_child: usize,
    ) -> Option<Candidate> {
        let mut levels: Vec<usize> = (0..hist.len()).filter(|&b| hist[b].count > 0).collect();
        if levels.len() < 2 {
            return None;
        }
        levels.sort_by(|&a, &b| {
            let ra = hist[a].g / hist[a].h.max(f64::EPSILON);
            let rb = hist[b].g / hist[b].h.max(f64::EPSILON);
            ra.total_cmp(&rb)
        });

        let mut best: Option<Candidate> = None;
        let mut left = Stats::default();
        for k in 0..levels.len() - 1 {
            left.add(&hist[levels[k]]);
            if left.count < min_child {
                continue;
            }
            let right = total.minus(&left);
            if right.count < min_child {
                break;
            }
            let gain = self.params.score(&left) + self.params.score(&right) - parent_score;
            if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Candidate {
                    feature,
                    gain,
                    rule: BinRule::Categorical {
                        left: levels[..=k].iter().map(|&b| b as u16).collect(),
                    },
                    left,
                    right,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureKind;
    use ndarray::{array, Array2};

    fn params(num_leaves: usize) -> TreeParams {
        TreeParams {
            num_leaves,
            max_depth: None,
            min_child_samples: 1,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
        }
    }

    /// Градиенты для квадратичной потери при нулевом прогнозе
    fn gradients(y: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (y.iter().map(|v| -v).collect(), vec![1.0; y.len()])
    }

    fn fit(X: &Array2<f64>, kinds: &[FeatureKind], y: &[f64], params: &TreeParams) -> Tree {
        let data = BinnedMatrix::fit(X, kinds, 255);
        let (g, h) = gradients(y);
        let features: Vec<usize> = (0..X.ncols()).collect();
        TreeBuilder::new(&data, &g, &h, params, &features).build((0..y.len()).collect())
    }

    #[test]
    fn test_numeric_step_function() {
        let X = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let tree = fit(&X, &[FeatureKind::Numeric], &y, &params(2));

        assert_eq!(tree.n_leaves(), 2);
        assert!((tree.predict_row(array![2.5].view()) - 1.0).abs() < 1e-12);
        assert!((tree.predict_row(array![11.5].view()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_values_learn_direction() {
        let X = array![[1.0], [2.0], [f64::NAN], [f64::NAN], [10.0], [11.0]];
        let y = [1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
        let tree = fit(&X, &[FeatureKind::Numeric], &y, &params(2));
        assert!((tree.predict_row(array![f64::NAN].view()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_split_groups_levels() {
        let kinds = [FeatureKind::Categorical {
            levels: vec!["a".into(), "b".into(), "c".into()],
        }];
        let X = array![[0.0], [2.0], [1.0], [0.0], [2.0], [1.0]];
        let y = [3.0, 3.0, 9.0, 3.0, 3.0, 9.0];
        let tree = fit(&X, &kinds, &y, &params(2));

        assert!((tree.predict_row(array![1.0].view()) - 9.0).abs() < 1e-12);
        assert!((tree.predict_row(array![2.0].view()) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_child_samples_blocks_split() {
        let X = array![[1.0], [2.0], [3.0]];
        let mut p = params(8);
        p.min_child_samples = 2;
        let tree = fit(&X, &[FeatureKind::Numeric], &[1.0, 2.0, 3.0], &p);
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict_row(array![1.0].view()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit() {
        let X = array![[1.0], [2.0], [3.0], [4.0]];
        let mut p = params(4);
        p.max_depth = Some(1);
        let tree = fit(&X, &[FeatureKind::Numeric], &[1.0, 2.0, 3.0, 4.0], &p);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_l1_shrinks_leaf() {
        let mut p = params(2);
        p.reg_alpha = 1.0;
        let s = Stats { g: -3.0, h: 2.0, count: 2 };
        assert_eq!(p.leaf_output(&s), 1.0);
        let small = Stats { g: 0.5, h: 1.0, count: 1 };
        assert_eq!(p.leaf_output(&small), 0.0);
    }
}
