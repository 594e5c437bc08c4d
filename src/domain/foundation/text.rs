//! Text matching helpers shared by the step classifier and the FAQ matcher.

/// Lowercases and folds Spanish diacritics so "Más" and "mas" compare equal.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

/// Returns the first keyword contained in `normalized_text`.
///
/// `normalized_text` must already be passed through [`normalize`]; keywords
/// are normalized here. Blank keywords never match.
pub fn find_keyword<'a, I>(normalized_text: &str, keywords: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    keywords.into_iter().map(String::as_str).find(|keyword| {
        let keyword = normalize(keyword.trim());
        !keyword.is_empty() && normalized_text.contains(&keyword)
    })
}

/// True when any keyword is contained in `normalized_text`.
pub fn contains_any<'a, I>(normalized_text: &str, keywords: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    find_keyword(normalized_text, keywords).is_some()
}

/// Maximal runs of ASCII digits, in order of appearance.
pub fn digit_runs(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}
