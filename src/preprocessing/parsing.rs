//! Разбор строковых полей объявлений

/// Категория квартиры, извлеченная из названия объявления
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCount {
    Count(f64),
    /// Многокомнатные квартиры и апартаменты - строки удаляются
    Excluded,
    Unknown,
}

const EXCLUDED_ROOM_TOKENS: [&str; 3] = ["Многокомнатная", "Многокомнатные", "Апартаменты"];
const STUDIO_TOKEN: &str = "Студия";
const NBSP: char = '\u{a0}';

/// "54,3\xa0м²" -> 54.3, "1\xa0250,5 м²" -> 1250.5
pub fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let number: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | ' ') || *c == NBSP)
        .filter(|c| *c != NBSP && *c != ' ')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Первое число строки: "7 мин. пешком" -> 7
pub fn leading_number(raw: &str) -> Option<f64> {
    raw.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Сумма первого и третьего токена: "1 совмещенный, 1 раздельный" -> 2.
/// Пропуск в одном из слагаемых не обнуляет сумму; оба пропуска -> None.
pub fn sum_count_tokens(raw: &str) -> Option<f64> {
    let tokens: Vec<&str> = raw.split(' ').collect();
    let first = tokens.first().and_then(|t| t.parse::<f64>().ok());
    let second = tokens.get(2).and_then(|t| t.parse::<f64>().ok());
    match (first, second) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

/// "5 из 12" -> (Some(5), Some(12)); "цоколь из 9" -> (None, Some(9))
pub fn split_floor(raw: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = raw.splitn(2, " из ");
    let floor = parts.next().and_then(|p| p.trim().parse::<f64>().ok());
    let total = parts.next().and_then(|p| p.trim().parse::<f64>().ok());
    (floor, total)
}

/// Количество комнат по префиксу названия: "2-комн. квартира, 54 м²" -> 2
pub fn room_count(title: &str) -> RoomCount {
    let token = title
        .split(' ')
        .next()
        .unwrap_or_default()
        .split('-')
        .next()
        .unwrap_or_default();

    if EXCLUDED_ROOM_TOKENS.contains(&token) {
        return RoomCount::Excluded;
    }
    if token.trim_end_matches(',') == STUDIO_TOKEN {
        return RoomCount::Count(1.0);
    }
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => RoomCount::Count(n),
        _ => RoomCount::Unknown,
    }
}

/// Первое слово строки: "Вторичка Апартаменты" -> "Вторичка"
pub fn first_token(raw: &str) -> String {
    raw.split(' ').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_decimal() {
        assert_eq!(parse_locale_decimal("54,3\u{a0}м²"), Some(54.3));
        assert_eq!(parse_locale_decimal("2,7\u{a0}м"), Some(2.7));
        assert_eq!(parse_locale_decimal("1\u{a0}250,5\u{a0}м²"), Some(1250.5));
        assert_eq!(parse_locale_decimal("48"), Some(48.0));
        assert_eq!(parse_locale_decimal("нет данных"), None);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("7 мин. пешком"), Some(7.0));
        assert_eq!(leading_number("пешком"), None);
    }

    #[test]
    fn test_sum_count_tokens_is_null_safe() {
        assert_eq!(sum_count_tokens("1 совмещенный, 1 раздельный"), Some(2.0));
        assert_eq!(sum_count_tokens("2 раздельных"), Some(2.0));
        assert_eq!(sum_count_tokens("балкон"), None);
    }

    #[test]
    fn test_split_floor() {
        assert_eq!(split_floor("5 из 12"), (Some(5.0), Some(12.0)));
        assert_eq!(split_floor("цоколь из 9"), (None, Some(9.0)));
    }

    #[test]
    fn test_room_count() {
        assert_eq!(room_count("2-комнатная"), RoomCount::Count(2.0));
        assert_eq!(room_count("3-комн. квартира, 80 м²"), RoomCount::Count(3.0));
        assert_eq!(room_count("Студия, 25 м²"), RoomCount::Count(1.0));
        assert_eq!(room_count("Многокомнатная"), RoomCount::Excluded);
        assert_eq!(room_count("Апартаменты-студия"), RoomCount::Excluded);
        assert_eq!(room_count("Своб. планировка"), RoomCount::Unknown);
    }
}
