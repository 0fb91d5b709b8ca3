//! Picks the provider best suited to a message when the caller asks for
//! `"smart"` selection. Each provider has fixed capability scores and each
//! kind of query weighs them differently.

/// Messages longer than this (in chars) count as long-context.
const LONG_QUERY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Code,
    Creative,
    Analytical,
    LongContext,
    General,
}

#[derive(Debug, Clone, Copy)]
struct Capabilities {
    speed: f32,
    accuracy: f32,
    creativity: f32,
    code_quality: f32,
    context_size: f32,
}

const CODE_KEYWORDS: &[&str] = &[
    "код", "функци", "класс", "компонент", "баг", "ошибка", "typescript", "javascript",
    "python", "react", "исправ", "debug", "api", "endpoint", "code", "function", "bug",
    "compile", "rust",
];
const CREATIVE_KEYWORDS: &[&str] = &[
    "созда", "напиши", "придума", "идея", "дизайн", "текст", "история", "статья", "контент",
    "пост", "write", "story", "poem", "idea", "design",
];
const ANALYTICAL_KEYWORDS: &[&str] = &[
    "анализ", "сравни", "объясни", "почему", "как работает", "причина", "следстви", "детально",
    "подробно", "analy", "compare", "explain", "why", "how does",
];
const LONG_CONTEXT_KEYWORDS: &[&str] = &[
    "весь", "все файлы", "целиком", "полностью", "проект", "документ", "entire", "whole",
    "document",
];

fn capabilities(provider: &str) -> Option<Capabilities> {
    let caps = |speed, accuracy, creativity, code_quality, context_size| Capabilities {
        speed,
        accuracy,
        creativity,
        code_quality,
        context_size,
    };
    Some(match provider {
        "gemini" => caps(9.0, 7.0, 6.0, 8.0, 8.0),
        "llama" => caps(6.0, 9.0, 7.0, 9.0, 9.0),
        "gigachat" => caps(7.0, 7.0, 9.0, 6.0, 7.0),
        "phi" => caps(8.0, 6.0, 5.0, 7.0, 6.0),
        "qwen" => caps(8.0, 8.0, 7.0, 8.0, 8.0),
        "mistral" => caps(9.0, 7.0, 6.0, 7.0, 7.0),
        _ => return None,
    })
}

pub fn analyze_query(query: &str) -> QueryType {
    let lower = query.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));

    if has(CODE_KEYWORDS) {
        QueryType::Code
    } else if has(CREATIVE_KEYWORDS) {
        QueryType::Creative
    } else if has(ANALYTICAL_KEYWORDS) {
        QueryType::Analytical
    } else if has(LONG_CONTEXT_KEYWORDS) || query.chars().count() > LONG_QUERY_CHARS {
        QueryType::LongContext
    } else {
        QueryType::General
    }
}

fn score(caps: Capabilities, query: QueryType) -> f32 {
    match query {
        QueryType::Code => caps.code_quality * 0.5 + caps.accuracy * 0.3 + caps.speed * 0.2,
        QueryType::Creative => caps.creativity * 0.6 + caps.speed * 0.3 + caps.accuracy * 0.1,
        QueryType::Analytical => {
            caps.accuracy * 0.6 + caps.context_size * 0.3 + caps.code_quality * 0.1
        }
        QueryType::LongContext => {
            caps.context_size * 0.7 + caps.accuracy * 0.2 + caps.speed * 0.1
        }
        QueryType::General => caps.speed * 0.4 + caps.accuracy * 0.3 + caps.creativity * 0.3,
    }
}

/// Index of the best provider for `query` among `providers`. Ties go to the
/// earlier entry; unknown names never win.
pub fn best_for(query: &str, providers: &[&str]) -> Option<usize> {
    let kind = analyze_query(query);
    let mut best: Option<(usize, f32)> = None;
    for (index, name) in providers.iter().enumerate() {
        let Some(caps) = capabilities(name) else {
            continue;
        };
        let s = score(caps, kind);
        if best.map_or(true, |(_, top)| s > top) {
            best = Some((index, s));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_queries() {
        assert_eq!(analyze_query("Исправь баг в функции"), QueryType::Code);
        assert_eq!(analyze_query("Напиши историю про кота"), QueryType::Creative);
        assert_eq!(analyze_query("Explain why the sky is blue"), QueryType::Analytical);
        assert_eq!(analyze_query(&"а".repeat(501)), QueryType::LongContext);
        assert_eq!(analyze_query("Привет"), QueryType::General);
    }

    #[test]
    fn code_questions_prefer_llama() {
        assert_eq!(best_for("fix this rust function", &["gemini", "llama"]), Some(1));
    }

    #[test]
    fn creative_questions_prefer_gigachat() {
        assert_eq!(best_for("придумай идею", &["qwen", "gigachat", "gemini"]), Some(1));
    }

    #[test]
    fn ties_keep_declaration_order() {
        // gemini and mistral score the same on general queries.
        assert_eq!(best_for("hello", &["mistral", "gemini"]), Some(0));
    }

    #[test]
    fn unknown_providers_are_ignored() {
        assert_eq!(best_for("hello", &["nope"]), None);
        assert_eq!(best_for("hello", &["nope", "phi"]), Some(1));
    }
}
