//! Заполнение пропусков
//!
//! Мода при равенстве частот берет наименьшее значение в порядке сортировки.

use std::collections::BTreeMap;

use crate::error::{PriceError, Result};

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Самое частое число; при равенстве - наименьшее
pub fn mode_f64(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let count = j - i;
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((sorted[i], count));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

/// Самая частая строка; при равенстве - первая по алфавиту
pub fn mode_str(values: &[&str]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

pub fn fill_median(values: &mut [Option<f64>], column: &str) -> Result<()> {
    if values.iter().all(|v| v.is_some()) {
        return Ok(());
    }
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let fill = median(&present).ok_or_else(|| PriceError::ImputationDegenerate(column.to_string()))?;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill);
    }
    Ok(())
}

pub fn fill_mode_text(values: &mut [Option<String>], column: &str) -> Result<()> {
    if values.iter().all(|v| v.is_some()) {
        return Ok(());
    }
    let present: Vec<&str> = values.iter().flatten().map(|s| s.as_str()).collect();
    let fill = mode_str(&present).ok_or_else(|| PriceError::ImputationDegenerate(column.to_string()))?;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill.clone());
    }
    Ok(())
}

/// Медиана доли площади `part / total`, округленная до сотых
pub fn area_ratio(part: &[Option<f64>], total: &[Option<f64>]) -> Option<f64> {
    let ratios: Vec<f64> = part
        .iter()
        .zip(total)
        .filter_map(|(p, t)| match (p, t) {
            (Some(p), Some(t)) if *t != 0.0 => Some(p / t),
            _ => None,
        })
        .collect();
    median(&ratios).map(|r| (r * 100.0).round() / 100.0)
}

/// Пропуск в площади = общая площадь * доля
pub fn fill_area_by_ratio(part: &mut [Option<f64>], total: &[Option<f64>], column: &str) -> Result<()> {
    if part.iter().all(|v| v.is_some()) {
        return Ok(());
    }
    let ratio = area_ratio(part, total).ok_or_else(|| PriceError::ImputationDegenerate(column.to_string()))?;
    for (p, t) in part.iter_mut().zip(total) {
        if p.is_none() {
            *p = t.map(|t| t * ratio);
        }
    }
    Ok(())
}

/// Заполнение модой внутри групп (группа с пропущенным ключом - отдельная)
pub fn fill_group_mode(groups: &[Option<f64>], values: &mut [Option<f64>], column: &str) -> Result<()> {
    let key = |g: &Option<f64>| g.map(|v| v.to_bits());

    let mut by_group: BTreeMap<Option<u64>, Vec<f64>> = BTreeMap::new();
    for (g, v) in groups.iter().zip(values.iter()) {
        let entry = by_group.entry(key(g)).or_default();
        if let Some(v) = v {
            entry.push(*v);
        }
    }

    let modes: BTreeMap<Option<u64>, Option<f64>> = by_group
        .into_iter()
        .map(|(k, vals)| (k, mode_f64(&vals)))
        .collect();

    for (g, v) in groups.iter().zip(values.iter_mut()) {
        if v.is_none() {
            let fill = modes.get(&key(g)).copied().flatten().ok_or_else(|| {
                PriceError::ImputationDegenerate(format!("{} (group {:?})", column, g))
            })?;
            *v = Some(fill);
        }
    }
    Ok(())
}

/// Число лифтов по этажности (СНиП 31-01-2003)
pub fn elevators_for_floors(floors_total: f64) -> f64 {
    match floors_total {
        f if f < 6.0 => 0.0,
        f if f < 10.0 => 1.0,
        f if f < 20.0 => 2.0,
        f if f < 25.0 => 3.0,
        _ => 4.0,
    }
}

/// Ноль лифтов трактуется как пропуск и заменяется нормативом
pub fn impute_elevators(elevators: &mut [Option<f64>], floors_total: &[Option<f64>]) {
    for (e, floors) in elevators.iter_mut().zip(floors_total) {
        let current = e.unwrap_or(0.0);
        *e = match floors {
            Some(f) if current == 0.0 => Some(elevators_for_floors(*f)),
            _ => Some(current),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mode_tie_break_takes_smallest() {
        assert_eq!(mode_f64(&[2.0, 1.0, 2.0, 1.0, 3.0]), Some(1.0));
        assert_eq!(mode_f64(&[5.0, 5.0, 1.0]), Some(5.0));
        assert_eq!(mode_str(&["Б", "А", "Б", "А"]), Some("А".to_string()));
    }

    #[test]
    fn test_fill_median_degenerate() {
        let mut values = vec![None, None];
        assert!(matches!(
            fill_median(&mut values, "x"),
            Err(PriceError::ImputationDegenerate(_))
        ));
    }

    #[test]
    fn test_area_ratio_fill() {
        let total = vec![Some(100.0), Some(50.0), Some(80.0)];
        let mut living = vec![Some(60.0), Some(30.0), None];
        fill_area_by_ratio(&mut living, &total, "living").unwrap();
        assert_eq!(living[2], Some(48.0));
    }

    #[test]
    fn test_group_mode() {
        let rooms = vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0)];
        let mut baths = vec![Some(1.0), Some(1.0), None, Some(2.0), None];
        fill_group_mode(&rooms, &mut baths, "bath").unwrap();
        assert_eq!(baths, vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_group_without_values_is_degenerate() {
        let rooms = vec![Some(1.0), Some(3.0)];
        let mut baths = vec![Some(1.0), None];
        assert!(fill_group_mode(&rooms, &mut baths, "bath").is_err());
    }

    #[test]
    fn test_elevator_rule() {
        let floors = vec![Some(5.0), Some(12.0), Some(30.0), Some(9.0), Some(16.0)];
        let mut elevators = vec![Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(1.0)];
        impute_elevators(&mut elevators, &floors);
        assert_eq!(
            elevators,
            vec![Some(0.0), Some(2.0), Some(4.0), Some(1.0), Some(1.0)]
        );
    }
}
