//! Транслитерация названий колонок в латиницу

/// Кириллица -> латиница (обратная таблица пакета transliterate для "ru")
fn latin(c: char) -> Option<&'static str> {
    let s = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "'",
        'ы' => "y",
        'ю' => "ju",
        'я' => "ja",
        _ => return None,
    };
    Some(s)
}

pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        match latin(lower) {
            Some(s) if lower != c => {
                // Заглавная: первая буква сочетания заглавная ("Ц" -> "Ts")
                let mut chars = s.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            Some(s) => out.push_str(s),
            None => out.push(c),
        }
    }
    out
}

/// Имя колонки для модели: латиница, пробелы -> "_", только [A-Za-z0-9_]
pub fn column_name(name: &str) -> String {
    transliterate(name)
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
